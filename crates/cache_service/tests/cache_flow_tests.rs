//! Integration tests driving a real cache server over loopback TCP with a
//! protocol-speaking client, covering the authentication, session caching
//! and join-world flows end to end.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

use cache_service::config::{AccountSeed, CacheConfig};
use cache_service::database::InMemoryDatabase;
use cache_service::CacheServer;
use inner_net::messages::service_layer::{
    InitializeRequest, InitializeResponse, SetSettingsRequest, SetSettingsResponse,
};
use inner_net::messages::user_data::{
    AuthenticationResult, CacheUserSessionRequest, CacheUserSessionResponse, JoinWorldRequest,
    JoinWorldResponse, JoinWorldResult, UnCacheUser, UserAuthenticationRequest,
    UserAuthenticationResponse, WorldsListRequest, WorldsListResponse,
};
use inner_net::messages::world_data::{SetWorldActiveRequest, SetWorldActiveResponse};
use inner_net::{
    Connection, Packet, ServiceIdentity, ServiceKind, UserSession, WorldSummary,
};

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

fn session(id: i32, login: &str) -> UserSession {
    UserSession {
        id,
        account_name: login.into(),
        account_id: 7,
        login1: 1,
        login2: 2,
        play1: 3,
        play2: 4,
        start_time: 1_700_000_000_000,
        last_world: 0,
        ip_address: "127.0.0.1".into(),
        blowfish_key: Vec::new(),
    }
}

async fn start_server() -> (Arc<CacheServer>, SocketAddr) {
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
        runner.start().await.expect("server should run");
    });

    // The listener publishes its real address once bound.
    for _ in 0..200 {
        if let Some(addr) = server.local_addr() {
            return (server, addr);
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("server did not bind in time");
}

/// A protocol-speaking test peer: one connection, sequential
/// request/response exchanges.
struct TestPeer {
    conn: Connection,
}

impl TestPeer {
    async fn connect(addr: SocketAddr, identity: ServiceIdentity) -> (Self, InitializeResponse) {
        let stream = TcpStream::connect(addr).await.expect("dial should succeed");
        let mut conn = Connection::new(stream).expect("connection setup should succeed");
        conn.handle()
            .send(InitializeRequest { identity }.to_packet())
            .expect("handshake send should succeed");
        let mut packet = timeout(WAIT, conn.read_packet())
            .await
            .expect("handshake response in time")
            .expect("handshake response should decode");
        let response = InitializeResponse::from_packet(&mut packet).expect("response should parse");
        (Self { conn }, response)
    }

    fn send(&self, packet: Packet) {
        self.conn.handle().send(packet).expect("send should succeed");
    }

    async fn read(&mut self) -> Packet {
        timeout(WAIT, self.conn.read_packet())
            .await
            .expect("response in time")
            .expect("response should decode")
    }
}

async fn login_peer(addr: SocketAddr, service_id: u8) -> TestPeer {
    let identity = ServiceIdentity::new(ServiceKind::LoginService, service_id);
    let (peer, response) = TestPeer::connect(addr, identity).await;
    assert!(response.accepted, "login peer should be accepted");
    peer
}

/// Connects a game service and waits for its world to go active.
async fn activate_world(addr: SocketAddr, world_id: u8) {
    let identity = ServiceIdentity::new(ServiceKind::GameService, world_id);
    let (mut peer, response) = TestPeer::connect(addr, identity).await;
    assert!(response.accepted, "game peer should be accepted");

    peer.send(SetWorldActiveRequest.to_packet());
    let mut packet = peer.read().await;
    SetWorldActiveResponse::from_packet(&mut packet).expect("activation echo should parse");
    // Keep the connection alive past the exchange; dropping it here is
    // fine because the world stays online either way.
}

async fn authenticate(
    peer: &mut TestPeer,
    request_id: i64,
    login: &str,
    password: &str,
    session_id: i32,
) -> UserAuthenticationResponse {
    peer.send(
        UserAuthenticationRequest {
            request_id,
            login: login.into(),
            password: password.into(),
            session_id,
        }
        .to_packet(),
    );
    let mut packet = peer.read().await;
    UserAuthenticationResponse::from_packet(&mut packet).expect("auth response should parse")
}

async fn cache_session(peer: &mut TestPeer, request_id: i64, s: UserSession) -> bool {
    peer.send(CacheUserSessionRequest { request_id, session: s }.to_packet());
    let mut packet = peer.read().await;
    CacheUserSessionResponse::from_packet(&mut packet)
        .expect("cache response should parse")
        .accepted
}

async fn join_world(
    peer: &mut TestPeer,
    request_id: i64,
    session_id: i32,
    world_id: u8,
) -> JoinWorldResult {
    peer.send(
        JoinWorldRequest {
            request_id,
            session_id,
            world_id,
        }
        .to_packet(),
    );
    let mut packet = peer.read().await;
    JoinWorldResponse::from_packet(&mut packet)
        .expect("join response should parse")
        .result
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_user_without_auto_create_is_rejected_cleanly() {
    let (server, addr) = start_server().await;
    let mut peer = login_peer(addr, 2).await;

    // Settings explicitly forbid auto-creation.
    peer.send(
        SetSettingsRequest {
            settings: inner_net::ServiceSettings::Login(inner_net::LoginServiceSettings {
                service_id: 2,
                auto_create_users: false,
                default_access_level: 0,
            }),
        }
        .to_packet(),
    );
    let mut packet = peer.read().await;
    assert!(SetSettingsResponse::from_packet(&mut packet).unwrap().accepted);

    let response = authenticate(&mut peer, 1, "nosuchuser", "pw", 500).await;
    assert_eq!(response.result, AuthenticationResult::UserOrPasswordWrong);
    assert!(!server.sessions().connected_session(500));

    // The rejection did not create the account either: same answer again.
    let again = authenticate(&mut peer, 2, "nosuchuser", "pw", 500).await;
    assert_eq!(again.result, AuthenticationResult::UserOrPasswordWrong);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_login_flow_authenticates_caches_and_joins() {
    let (server, addr) = start_server().await;
    let mut peer = login_peer(addr, 2).await;

    let auth = authenticate(&mut peer, 1, "bob", "x", 100).await;
    assert_eq!(auth.result, AuthenticationResult::UserAccepted);

    assert!(cache_session(&mut peer, 2, session(100, "bob")).await);
    assert!(server.sessions().connected_session(100));
    assert!(server.sessions().connected_account("bob"));

    // World 1 exists but has not announced readiness yet.
    assert_eq!(join_world(&mut peer, 3, 100, 1).await, JoinWorldResult::SystemError);

    activate_world(addr, 1).await;
    assert_eq!(join_world(&mut peer, 4, 100, 1).await, JoinWorldResult::Accepted);
    assert_eq!(server.sessions().find(100).unwrap().last_world, 1);

    // World 2 is online but at capacity.
    activate_world(addr, 2).await;
    assert_eq!(
        join_world(&mut peer, 5, 100, 2).await,
        JoinWorldResult::TooManyPlayers
    );

    // Unknown worlds fail closed.
    assert_eq!(join_world(&mut peer, 6, 100, 42).await, JoinWorldResult::SystemError);
}

#[tokio::test(flavor = "multi_thread")]
async fn live_sessions_block_reauthentication() {
    let (_server, addr) = start_server().await;
    let mut peer = login_peer(addr, 2).await;

    let auth = authenticate(&mut peer, 1, "bob", "x", 100).await;
    assert_eq!(auth.result, AuthenticationResult::UserAccepted);
    assert!(cache_session(&mut peer, 2, session(100, "bob")).await);

    // Same session id: refused outright.
    let same_session = authenticate(&mut peer, 3, "bob", "x", 100).await;
    assert_eq!(same_session.result, AuthenticationResult::AccessFailed);

    // Fresh session id, same account: the account is in use.
    let same_account = authenticate(&mut peer, 4, "bob", "x", 101).await;
    assert_eq!(same_account.result, AuthenticationResult::AccountInUse);

    // A second session for the same account cannot be cached either.
    assert!(!cache_session(&mut peer, 5, session(101, "bob")).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn worlds_list_returns_the_cached_snapshot() {
    let (_server, addr) = start_server().await;
    let mut peer = login_peer(addr, 2).await;

    peer.send(WorldsListRequest { request_id: 9 }.to_packet());
    let mut packet = peer.read().await;
    let response = WorldsListResponse::from_packet(&mut packet).expect("list should parse");

    assert_eq!(response.request_id, 9);
    let mut ids: Vec<u8> = response.worlds.iter().map(|w| w.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn uncache_forgets_the_session() {
    let (server, addr) = start_server().await;
    let mut peer = login_peer(addr, 2).await;

    let auth = authenticate(&mut peer, 1, "bob", "x", 100).await;
    assert_eq!(auth.result, AuthenticationResult::UserAccepted);
    assert!(cache_session(&mut peer, 2, session(100, "bob")).await);

    peer.send(UnCacheUser { session_id: 100 }.to_packet());

    // Fire-and-forget, but packets on one connection are handled in
    // arrival order: once the next authentication round-trips, the
    // uncache has landed.
    let after = authenticate(&mut peer, 3, "bob", "x", 100).await;
    assert_eq!(after.result, AuthenticationResult::UserAccepted);
    assert!(!server.sessions().connected_session(100));
    assert!(!server.sessions().connected_account("bob"));
}

#[tokio::test(flavor = "multi_thread")]
async fn second_claimant_of_a_service_id_is_rejected() {
    let (_server, addr) = start_server().await;
    let _first = login_peer(addr, 2).await;

    let identity = ServiceIdentity::new(ServiceKind::LoginService, 2);
    let (_peer, response) = TestPeer::connect(addr, identity).await;
    assert!(!response.accepted, "second claimant must be rejected");
}
