//! End-to-end test: a game service announcing its world to a real cache
//! service, including re-announcement after the link drops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use cache_service::config::CacheConfig;
use cache_service::database::InMemoryDatabase;
use cache_service::CacheServer;
use game_service::{GameConfig, GameService};
use inner_net::WorldSummary;

const WAIT: Duration = Duration::from_secs(5);

fn world(id: u8) -> WorldSummary {
    WorldSummary {
        id,
        address: [127, 0, 0, 1],
        port: 7000 + id as u16,
        age_limit: 0,
        is_pvp: false,
        users_max: 10,
        users_online: 0,
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
    config.worlds = vec![world(1)];

    let database = Arc::new(InMemoryDatabase::new(config.worlds.clone(), &[]));
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

#[tokio::test(flavor = "multi_thread")]
async fn world_goes_online_once_the_game_service_announces() {
    let (cache, cache_addr) = start_cache().await;
    assert!(!cache.worlds().is_online(1));

    let mut config = GameConfig::default();
    config.service.service_id = 1;
    config.cache.address = cache_addr.to_string();
    config.cache.reconnect_interval_ms = 50;

    let service = GameService::start(config).expect("service should start");
    timeout(WAIT, service.wait_active())
        .await
        .expect("world should become active");

    assert!(cache.worlds().is_online(1));
    service.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn announcement_repeats_after_a_reconnect() {
    let (cache, cache_addr) = start_cache().await;

    let mut config = GameConfig::default();
    config.service.service_id = 1;
    config.cache.address = cache_addr.to_string();
    config.cache.reconnect_interval_ms = 50;

    let service = GameService::start(config).expect("service should start");
    timeout(WAIT, service.wait_active())
        .await
        .expect("world should become active");

    // Kick the game service from the cache side; the link re-identifies,
    // re-pushes settings and announces again.
    let old = cache
        .connections()
        .handle(1)
        .expect("game service is registered");
    old.close();

    timeout(WAIT, async {
        loop {
            match cache.connections().handle(1) {
                Some(current) if current.id() != old.id() => return,
                _ => sleep(Duration::from_millis(10)).await,
            }
        }
    })
    .await
    .expect("a fresh connection should re-register after reconnect");

    assert!(cache.worlds().is_online(1));
    service.shutdown();
}
