//! Registry of currently connected user sessions.
//!
//! Two indexes are kept: by session id and by account name, and at most
//! one live session exists per key in either. Both indexes mutate under
//! one lock so no caller can ever observe one updated without the other.

use std::collections::HashMap;
use std::sync::Mutex;

use inner_net::UserSession;

#[derive(Default)]
struct Tables {
    by_id: HashMap<i32, UserSession>,
    by_login: HashMap<String, i32>,
}

/// Connected-users table of the cache service.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<Tables>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a session with this id is already connected.
    pub fn connected_session(&self, session_id: i32) -> bool {
        self.lock().by_id.contains_key(&session_id)
    }

    /// True when a user with this account name is already connected.
    pub fn connected_account(&self, login: &str) -> bool {
        self.lock().by_login.contains_key(login)
    }

    /// Registers a session in both indexes. Fails, leaving prior state
    /// unchanged, when the session carries no account name or either key
    /// is already taken.
    pub fn register(&self, session: UserSession) -> bool {
        if session.account_name.is_empty() {
            return false;
        }
        let mut tables = self.lock();
        if tables.by_id.contains_key(&session.id)
            || tables.by_login.contains_key(&session.account_name)
        {
            return false;
        }
        tables
            .by_login
            .insert(session.account_name.clone(), session.id);
        tables.by_id.insert(session.id, session);
        true
    }

    /// Drops a session by id, clearing both indexes.
    pub fn unregister_session(&self, session_id: i32) -> Option<UserSession> {
        let mut tables = self.lock();
        let session = tables.by_id.remove(&session_id)?;
        tables.by_login.remove(&session.account_name);
        Some(session)
    }

    /// Drops a session by account name, clearing both indexes.
    pub fn unregister_account(&self, login: &str) -> Option<UserSession> {
        let mut tables = self.lock();
        let session_id = tables.by_login.remove(login)?;
        tables.by_id.remove(&session_id)
    }

    /// Looks up a session by id.
    pub fn find(&self, session_id: i32) -> Option<UserSession> {
        self.lock().by_id.get(&session_id).cloned()
    }

    /// Records which world the session just joined (zero when leaving).
    pub fn update_current_world(&self, session_id: i32, world_id: u8) {
        if let Some(session) = self.lock().by_id.get_mut(&session_id) {
            session.last_world = world_id;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().expect("session registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: i32, login: &str) -> UserSession {
        UserSession {
            id,
            account_name: login.into(),
            account_id: id + 1000,
            login1: 0,
            login2: 0,
            play1: 0,
            play2: 0,
            start_time: 0,
            last_world: 0,
            ip_address: "127.0.0.1".into(),
            blowfish_key: Vec::new(),
        }
    }

    #[test]
    fn register_makes_both_indexes_visible() {
        let registry = SessionRegistry::new();
        assert!(registry.register(session(1, "bob")));
        assert!(registry.connected_session(1));
        assert!(registry.connected_account("bob"));
    }

    #[test]
    fn unregister_by_id_clears_both_indexes() {
        let registry = SessionRegistry::new();
        registry.register(session(1, "bob"));
        assert!(registry.unregister_session(1).is_some());
        assert!(!registry.connected_session(1));
        assert!(!registry.connected_account("bob"));
    }

    #[test]
    fn unregister_by_login_clears_both_indexes() {
        let registry = SessionRegistry::new();
        registry.register(session(1, "bob"));
        assert!(registry.unregister_account("bob").is_some());
        assert!(!registry.connected_session(1));
        assert!(!registry.connected_account("bob"));
    }

    #[test]
    fn duplicate_id_is_refused_and_leaves_prior_state_unchanged() {
        let registry = SessionRegistry::new();
        assert!(registry.register(session(1, "bob")));
        assert!(!registry.register(session(1, "alice")));

        assert!(registry.connected_account("bob"));
        // The refused registration must not leak into either index.
        assert!(!registry.connected_account("alice"));
        assert_eq!(registry.find(1).unwrap().account_name, "bob");
    }

    #[test]
    fn duplicate_login_is_refused() {
        let registry = SessionRegistry::new();
        assert!(registry.register(session(1, "bob")));
        assert!(!registry.register(session(2, "bob")));
        assert!(!registry.connected_session(2));
    }

    #[test]
    fn nameless_session_is_null_equivalent() {
        let registry = SessionRegistry::new();
        assert!(!registry.register(session(1, "")));
        assert!(registry.is_empty());
    }

    #[test]
    fn current_world_updates_in_place() {
        let registry = SessionRegistry::new();
        registry.register(session(1, "bob"));
        registry.update_current_world(1, 4);
        assert_eq!(registry.find(1).unwrap().last_world, 4);
        // Unknown ids are a no-op.
        registry.update_current_world(99, 4);
    }
}
