use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::{Future, FutureExt as _, TryFutureExt as _};
use tokio::time::Instant;

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, Arc<E>>>>;

struct Slot<V, E> {
    fetch: SharedFetch<V, E>,
    started: Instant,
}

/// Request coalescing with a deduplication window.
///
/// Every request for a key made within `window` of the first one shares that request's result, whether it
/// is still in flight or already resolved. Failed results are dropped right away so the next request fetches
/// again. Nothing is refreshed in the background: an expired entry is only replaced when it is asked for.
pub struct Coalescer<K, V, E> {
    window: Duration,
    slots: Arc<DashMap<K, Slot<V, E>>>,
}

impl<K, V, E> Coalescer<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Arc::new(DashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns the shared result for `key`, calling `fetch` only when no entry is live.
    pub async fn get<F, Fut>(&self, key: K, fetch: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let shared = self.slot(key.clone(), fetch);
        let result = shared.clone().await;

        if result.is_err() {
            // only evict the attempt we awaited, a newer one may already have replaced it
            self.slots
                .remove_if(&key, |_, slot| slot.fetch.ptr_eq(&shared));
        }

        result
    }

    fn slot<F, Fut>(&self, key: K, fetch: F) -> SharedFetch<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let now = Instant::now();
        let start = |fetch: F| Slot {
            fetch: fetch().map_err(Arc::new).boxed().shared(),
            started: now,
        };

        // expired entries of keys nobody asks for again would otherwise stay forever,
        // so drop them before taking the entry guard
        self.slots
            .retain(|_, slot| now.duration_since(slot.started) < self.window);

        // the map guard is released before anything is awaited
        match self.slots.entry(key) {
            Entry::Occupied(occupied) if now.duration_since(occupied.get().started) < self.window => {
                occupied.get().fetch.clone()
            }
            Entry::Occupied(mut occupied) => {
                let slot = start(fetch);
                let shared = slot.fetch.clone();
                occupied.insert(slot);
                shared
            }
            Entry::Vacant(vacant) => vacant.insert(start(fetch)).fetch.clone(),
        }
    }

    /// Drops the entry for `key` so the next request fetches again.
    pub fn invalidate(&self, key: &K) {
        self.slots.remove(key);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K, V, E> Clone for Coalescer<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            slots: self.slots.clone(),
        }
    }
}

impl<K: Hash + Eq, V, E> std::fmt::Debug for Coalescer<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("window", &self.window)
            .field("entries", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Boom;

    fn counted(
        calls: &Arc<AtomicUsize>,
        outcome: Result<u64, Boom>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u64, Boom>> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                outcome
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn simultaneous_requests_share_one_fetch() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get("stats", counted(&calls, Ok(1))),
            cache.get("stats", counted(&calls, Ok(2))),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolved_value_is_reused_within_the_window() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("stats", counted(&calls, Ok(1))).await.unwrap();
        let again = cache.get("stats", counted(&calls, Ok(2))).await.unwrap();

        assert_eq!(again, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get("ada", counted(&calls, Ok(1))),
            cache.get("bob", counted(&calls, Ok(2))),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_fetched_again() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("stats", counted(&calls, Ok(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let fresh = cache.get("stats", counted(&calls, Ok(2))).await.unwrap();

        assert_eq!(fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_of_other_keys_are_dropped() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("old-token", counted(&calls, Ok(1))).await.unwrap();
        cache.get("older-token", counted(&calls, Ok(2))).await.unwrap();
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.get("new-token", counted(&calls, Ok(3))).await.unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_remembered() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        let failed = cache.get("stats", counted(&calls, Err(Boom))).await;
        assert_eq!(failed.unwrap_err().as_ref(), &Boom);
        assert!(cache.is_empty());

        let recovered = cache.get("stats", counted(&calls, Ok(3))).await.unwrap();
        assert_eq!(recovered, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_fetch() {
        let cache: Coalescer<&str, u64, Boom> = Coalescer::new(Duration::from_secs(300));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("stats", counted(&calls, Ok(1))).await.unwrap();
        cache.invalidate(&"stats");
        let fresh = cache.get("stats", counted(&calls, Ok(2))).await.unwrap();

        assert_eq!(fresh, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
