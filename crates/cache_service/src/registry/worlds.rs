//! Registry of known worlds and their online/capacity state.
//!
//! Loaded wholesale from the database collaborator at startup; individual
//! entries only ever mutate their `is_online` flag when a game service
//! announces readiness. Absent ids answer fail-closed: not online, full.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::{info, warn};

use inner_net::WorldSummary;

use crate::database::Database;

/// Worlds table of the cache service.
#[derive(Default)]
pub struct WorldRegistry {
    worlds: Mutex<BTreeMap<u8, WorldSummary>>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole table from the database. Duplicate ids in the
    /// source data are logged and the first-seen entry kept.
    pub async fn cache(&self, database: &dyn Database) {
        let loaded = database.worlds_cache().await;

        let mut worlds = self.lock();
        worlds.clear();
        for summary in loaded {
            if worlds.contains_key(&summary.id) {
                warn!(
                    world_id = summary.id,
                    "database records error - duplicated world unique ids found"
                );
            } else {
                worlds.insert(summary.id, summary);
            }
        }
        info!(count = worlds.len(), "cached worlds info");
    }

    /// Snapshot copy of every world; the live table stays private.
    pub fn snapshot(&self) -> Vec<WorldSummary> {
        self.lock().values().cloned().collect()
    }

    /// Marks a world online and ready for user connections. Unknown ids
    /// are a no-op.
    pub fn set_active(&self, id: u8) {
        if let Some(world) = self.lock().get_mut(&id) {
            world.is_online = true;
        }
    }

    pub fn contains(&self, id: u8) -> bool {
        self.lock().contains_key(&id)
    }

    /// False for worlds the registry does not know.
    pub fn is_online(&self, id: u8) -> bool {
        self.lock().get(&id).map(|w| w.is_online).unwrap_or(false)
    }

    /// True for worlds the registry does not know: an unknown world can
    /// never admit a player.
    pub fn is_full(&self, id: u8) -> bool {
        self.lock().get(&id).map(|w| w.is_full()).unwrap_or(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u8, WorldSummary>> {
        self.worlds.lock().expect("world registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;

    fn world(id: u8, users_max: i16, users_online: i16) -> WorldSummary {
        WorldSummary {
            id,
            address: [127, 0, 0, 1],
            port: 7777,
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

    async fn loaded(worlds: Vec<WorldSummary>) -> WorldRegistry {
        let db = InMemoryDatabase::new(worlds, &[]);
        let registry = WorldRegistry::new();
        registry.cache(&db).await;
        registry
    }

    #[tokio::test]
    async fn full_gate_is_users_online_at_or_past_max() {
        let registry = loaded(vec![world(1, 10, 9), world(2, 10, 10)]).await;
        assert!(!registry.is_full(1));
        assert!(registry.is_full(2));
    }

    #[tokio::test]
    async fn unknown_world_is_full_and_offline() {
        let registry = loaded(vec![world(1, 10, 0)]).await;
        assert!(registry.is_full(42));
        assert!(!registry.is_online(42));
        assert!(!registry.contains(42));
    }

    #[tokio::test]
    async fn set_active_flips_one_entry_and_ignores_unknown_ids() {
        let registry = loaded(vec![world(1, 10, 0), world(2, 10, 0)]).await;
        assert!(!registry.is_online(1));

        registry.set_active(1);
        assert!(registry.is_online(1));
        assert!(!registry.is_online(2));

        // No entry, no panic.
        registry.set_active(42);
    }

    #[tokio::test]
    async fn duplicate_source_ids_keep_the_first_seen_entry() {
        let mut second = world(1, 10, 0);
        second.port = 8888;
        let registry = loaded(vec![world(1, 10, 0), second]).await;

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].port, 7777);
    }

    #[tokio::test]
    async fn recache_replaces_the_table_wholesale() {
        let registry = loaded(vec![world(1, 10, 0), world(2, 10, 0)]).await;
        registry.set_active(1);

        let db = InMemoryDatabase::new(vec![world(3, 10, 0)], &[]);
        registry.cache(&db).await;

        assert!(!registry.contains(1));
        assert!(registry.contains(3));
    }
}
