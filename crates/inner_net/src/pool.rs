//! Request correlation pool.
//!
//! A caller that must await a cross-service answer parks its continuation
//! here under a freshly minted request id and resumes when a response
//! carrying that id arrives. This converts the notify-based inner protocol
//! into a request/response pattern without blocking any task: the parked
//! context is typically a oneshot sender the caller is awaiting.
//!
//! The id counter and the pending map are a joint invariant (an id is
//! unique among *currently pending* entries), so both live under one mutex.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Pending<T> {
    context: T,
    queued_at: Instant,
}

struct PoolInner<T> {
    next_id: i64,
    open: bool,
    pending: HashMap<i64, Pending<T>>,
}

/// Pool of pending cross-service requests, keyed by request id.
///
/// Mutated concurrently by connection tasks and sweep timers; every
/// operation takes the single internal lock.
pub struct RequestPool<T> {
    inner: Mutex<PoolInner<T>>,
}

impl<T> RequestPool<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                next_id: 1,
                open: true,
                pending: HashMap::new(),
            }),
        }
    }

    /// Parks `context` under a fresh request id, unique among currently
    /// pending entries. Returns `None` when the pool has been shut down.
    pub fn enqueue(&self, context: T) -> Option<i64> {
        let mut inner = self.inner.lock().expect("request pool lock poisoned");
        if !inner.open {
            return None;
        }
        // Monotonic ids; on (theoretical) wrap-around, probe past any id
        // that is still pending so uniqueness holds.
        let mut id = inner.next_id;
        while inner.pending.contains_key(&id) {
            id = id.wrapping_add(1).max(1);
        }
        inner.next_id = id.wrapping_add(1).max(1);
        inner.pending.insert(
            id,
            Pending {
                context,
                queued_at: Instant::now(),
            },
        );
        Some(id)
    }

    /// Atomically removes and returns the parked context for `request_id`.
    ///
    /// Returns `None` for unknown ids: already handled, never issued, or
    /// bogus. Callers must treat that as a correlation miss (log and
    /// discard), never as something to dereference.
    pub fn dequeue(&self, request_id: i64) -> Option<T> {
        let mut inner = self.inner.lock().expect("request pool lock poisoned");
        inner.pending.remove(&request_id).map(|p| p.context)
    }

    /// Removes and returns every entry older than `max_age`, so the owner
    /// can fail the parked callers with a timed-out outcome. Without this
    /// sweep, a remote that never answers would grow the pool forever.
    pub fn expire_older_than(&self, max_age: Duration) -> Vec<(i64, T)> {
        let mut inner = self.inner.lock().expect("request pool lock poisoned");
        let now = Instant::now();
        let expired: Vec<i64> = inner
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.queued_at) >= max_age)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| inner.pending.remove(&id).map(|p| (id, p.context)))
            .collect()
    }

    /// Removes and returns every pending entry. Used when the remote side
    /// disconnects: nothing in flight can be answered anymore.
    pub fn drain(&self) -> Vec<(i64, T)> {
        let mut inner = self.inner.lock().expect("request pool lock poisoned");
        inner.pending.drain().map(|(id, p)| (id, p.context)).collect()
    }

    /// Closes the pool (further `enqueue` calls refuse) and drains what
    /// was still pending.
    pub fn shutdown(&self) -> Vec<(i64, T)> {
        {
            let mut inner = self.inner.lock().expect("request pool lock poisoned");
            inner.open = false;
        }
        self.drain()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("request pool lock poisoned")
            .pending
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RequestPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn enqueued_ids_are_pairwise_distinct() {
        let pool = RequestPool::new();
        let mut seen = HashSet::new();
        for i in 0..1000 {
            let id = pool.enqueue(i).expect("pool is open");
            assert!(seen.insert(id), "id {id} repeated");
        }
        assert_eq!(pool.len(), 1000);
    }

    #[test]
    fn dequeue_returns_the_parked_context_exactly_once() {
        let pool = RequestPool::new();
        let id = pool.enqueue("ctx").unwrap();
        assert_eq!(pool.dequeue(id), Some("ctx"));
        assert_eq!(pool.dequeue(id), None);
    }

    #[test]
    fn dequeue_of_a_bogus_id_is_a_miss() {
        let pool: RequestPool<u8> = RequestPool::new();
        assert_eq!(pool.dequeue(12345), None);
    }

    #[test]
    fn expiry_only_claims_old_entries() {
        let pool = RequestPool::new();
        let stale = pool.enqueue("stale").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let fresh = pool.enqueue("fresh").unwrap();

        let expired = pool.expire_older_than(Duration::from_millis(20));
        assert_eq!(expired, vec![(stale, "stale")]);
        assert_eq!(pool.dequeue(fresh), Some("fresh"));
    }

    #[test]
    fn shutdown_refuses_new_entries_and_drains_pending() {
        let pool = RequestPool::new();
        pool.enqueue(1).unwrap();
        pool.enqueue(2).unwrap();

        let drained = pool.shutdown();
        assert_eq!(drained.len(), 2);
        assert!(pool.enqueue(3).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn ids_can_be_reused_after_being_freed() {
        let pool = RequestPool::new();
        // Force the counter to the wrap boundary; the next id must skip
        // anything still pending and stay positive.
        {
            let mut inner = pool.inner.lock().unwrap();
            inner.next_id = i64::MAX;
        }
        let a = pool.enqueue("a").unwrap();
        let b = pool.enqueue("b").unwrap();
        assert_ne!(a, b);
        assert!(b >= 1);
    }
}
