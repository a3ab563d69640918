//! End-to-end tests: a real login service talking to a real cache service
//! over loopback, exercising the full authenticate → cache-session →
//! worlds-list → join-world chain plus the failure paths.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use cache_service::config::{AccountSeed, CacheConfig};
use cache_service::database::InMemoryDatabase;
use cache_service::CacheServer;
use inner_net::messages::user_data::{AuthenticationResult, JoinWorldResult};
use inner_net::{UserSession, WorldSummary};
use login_service::{ClientReply, LoginConfig, LoginService};

const WAIT: Duration = Duration::from_secs(5);

fn world(id: u8, users_max: i16, users_online: i16) -> WorldSummary {
    WorldSummary {
        id,
        address: [127, 0, 0, 1],
        port: 7000 + id as u16,
        age_limit: 0,
        is_pvp: false,
        users_max,
        users_online,
        show_brackets: false,
        is_test_server: false,
        show_clock: false,
        is_online: false,
        access_level: 0,
    }
}

async fn start_cache() -> (Arc<CacheServer>, SocketAddr) {
    let mut config = CacheConfig::default();
    config.service.bind_address = "127.0.0.1:0".to_string();
    config.worlds = vec![world(1, 10, 0), world(2, 10, 10)];
    config.accounts = vec![AccountSeed {
        login: "bob".into(),
        password: "x".into(),
        access_level: 0,
    }];

    let database = Arc::new(InMemoryDatabase::new(config.worlds.clone(), &config.accounts));
    let server = Arc::new(CacheServer::new(config, database));

    let runner = server.clone();
    tokio::spawn(async move {
        runner.start().await.expect("cache server should run");
    });

    for _ in 0..200 {
        if let Some(addr) = server.local_addr() {
            return (server, addr);
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("cache server did not bind in time");
}

fn login_config(cache_addr: SocketAddr, service_id: u8) -> LoginConfig {
    let mut config = LoginConfig::default();
    config.service.service_id = service_id;
    config.cache.address = cache_addr.to_string();
    config.cache.reconnect_interval_ms = 50;
    config.cache.request_timeout_ms = 2000;
    config
}

async fn start_login(cache_addr: SocketAddr, service_id: u8) -> LoginService {
    let service =
        LoginService::start(login_config(cache_addr, service_id)).expect("service should start");
    timeout(WAIT, service.wait_ready())
        .await
        .expect("login service should become ready");
    service
}

async fn login_ok(service: &LoginService, login: &str, password: &str) -> UserSession {
    match service.flows().authenticate(login, password, "127.0.0.1").await {
        ClientReply::LoginOk(session) => session,
        other => panic!("expected LoginOk, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn seeded_account_logs_in_and_is_cached() {
    let (cache, cache_addr) = start_cache().await;
    let service = start_login(cache_addr, 2).await;

    let session = login_ok(&service, "bob", "x").await;
    assert_eq!(session.account_name, "bob");
    assert!(session.account_id > 0);

    assert!(cache.sessions().connected_session(session.id));
    assert!(cache.sessions().connected_account("bob"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_account_fails_without_creating_anything() {
    let (cache, cache_addr) = start_cache().await;
    let service = start_login(cache_addr, 2).await;

    match service.flows().authenticate("alice", "pw", "127.0.0.1").await {
        ClientReply::LoginFailed(AuthenticationResult::UserOrPasswordWrong) => {}
        other => panic!("expected UserOrPasswordWrong, got {other:?}"),
    }
    assert!(!cache.sessions().connected_account("alice"));
}

#[tokio::test(flavor = "multi_thread")]
async fn auto_create_policy_admits_new_accounts() {
    let (cache, cache_addr) = start_cache().await;

    let mut config = login_config(cache_addr, 2);
    config.users.auto_create_users = true;
    config.users.default_access_level = 1;
    let service = LoginService::start(config).expect("service should start");
    timeout(WAIT, service.wait_ready())
        .await
        .expect("login service should become ready");

    let session = login_ok(&service, "fresh", "pw").await;
    assert!(session.account_id > 0);
    assert!(cache.sessions().connected_account("fresh"));
}

#[tokio::test(flavor = "multi_thread")]
async fn second_login_for_a_live_account_is_refused() {
    let (_cache, cache_addr) = start_cache().await;
    let service = start_login(cache_addr, 2).await;

    let _session = login_ok(&service, "bob", "x").await;

    match service.flows().authenticate("bob", "x", "127.0.0.1").await {
        ClientReply::LoginFailed(AuthenticationResult::AccountInUse) => {}
        other => panic!("expected AccountInUse, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn access_level_gate_rejects_low_accounts() {
    let (cache, cache_addr) = start_cache().await;

    let mut config = login_config(cache_addr, 3);
    config.users.allowed_access_level = 5;
    let service = LoginService::start(config).expect("service should start");
    timeout(WAIT, service.wait_ready())
        .await
        .expect("login service should become ready");

    match service.flows().authenticate("bob", "x", "127.0.0.1").await {
        ClientReply::LoginFailed(AuthenticationResult::AccessFailed) => {}
        other => panic!("expected AccessFailed, got {other:?}"),
    }
    // Gated before the cache-session step: nothing was registered.
    assert!(!cache.sessions().connected_account("bob"));
}

#[tokio::test(flavor = "multi_thread")]
async fn worlds_list_and_join_world_follow_the_cached_state() {
    let (cache, cache_addr) = start_cache().await;
    let service = start_login(cache_addr, 2).await;

    let session = login_ok(&service, "bob", "x").await;

    match service.flows().worlds_list(&session).await {
        ClientReply::WorldsList { worlds, .. } => {
            let mut ids: Vec<u8> = worlds.iter().map(|w| w.id).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec![1, 2]);
        }
        other => panic!("expected WorldsList, got {other:?}"),
    }

    // Not announced yet: refused as a system error.
    match service.flows().join_world(&session, 1).await {
        ClientReply::PlayFailed(JoinWorldResult::SystemError) => {}
        other => panic!("expected SystemError, got {other:?}"),
    }

    cache.worlds().set_active(1);
    match service.flows().join_world(&session, 1).await {
        ClientReply::PlayOk(joined) => assert_eq!(joined.id, session.id),
        other => panic!("expected PlayOk, got {other:?}"),
    }

    // Online but at capacity.
    cache.worlds().set_active(2);
    match service.flows().join_world(&session, 2).await {
        ClientReply::PlayFailed(JoinWorldResult::TooManyPlayers) => {}
        other => panic!("expected TooManyPlayers, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_uncaches_the_session() {
    let (cache, cache_addr) = start_cache().await;
    let service = start_login(cache_addr, 2).await;

    let session = login_ok(&service, "bob", "x").await;
    assert!(cache.sessions().connected_session(session.id));

    service.flows().logout(session.id);

    for _ in 0..200 {
        if !cache.sessions().connected_session(session.id) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("session was not uncached in time");
}

#[tokio::test(flavor = "multi_thread")]
async fn unanswered_requests_time_out_with_a_definite_failure() {
    // A peer that accepts the socket but never answers anything.
    let silent = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("silent listener should bind");
    let silent_addr = silent.local_addr().expect("silent listener address");
    tokio::spawn(async move {
        let mut sockets = Vec::new();
        while let Ok((socket, _)) = silent.accept().await {
            sockets.push(socket);
        }
    });

    let mut config = login_config(silent_addr, 2);
    config.cache.request_timeout_ms = 200;
    let service = LoginService::start(config).expect("service should start");

    // No handshake response will ever come; the flow must still resolve.
    let reply = timeout(
        Duration::from_secs(3),
        service.flows().authenticate("bob", "x", "127.0.0.1"),
    )
    .await
    .expect("flow must resolve instead of hanging");

    match reply {
        ClientReply::LoginFailed(AuthenticationResult::SystemError) => {}
        other => panic!("expected SystemError after timeout, got {other:?}"),
    }
}
