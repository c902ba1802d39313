//! Time-bounded in-memory cache with a periodic background refresher.
//!
//! Entries are plain snapshots: readers get a clone of the stored value
//! (cheap when the value is an `Arc`). Expired entries read as misses but are
//! only removed by [`TtlCache::clear`], which the refresher triggers once per
//! period through the service's warm-up.
//!
//! The store sits behind one mutex held for the map operation only, never
//! across a fetch. Two concurrent misses on the same key will both fetch;
//! in-flight fetches are not deduplicated.

use std::collections::HashMap;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// What is cached for a sheet. Header and rows are independent entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Parsed data rows.
    Sheet,
    /// The raw header row.
    SheetHeader,
}

impl CacheKind {
    fn prefix(self) -> &'static str {
        match self {
            CacheKind::Sheet => "sheet",
            CacheKind::SheetHeader => "sheet_header",
        }
    }
}

/// Cache key for a kind of data of a logical sheet, e.g. `sheet_header::Тексты`.
pub fn cache_key(kind: CacheKind, sheet: &str) -> String {
    format!("{}::{sheet}", kind.prefix())
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// String-keyed cache whose entries are readable for `ttl` after being set.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A panic elsewhere cannot leave a half-written entry: every critical
    // section is a single map call, so the map is usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The value for `key` if it was set no more than `ttl` ago.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.lock();
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        debug!(%key, "cache set");
        self.lock().insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently stored, expired ones included.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

// ---------------------------------------------------------------------------
// RefreshHandle
// ---------------------------------------------------------------------------

/// Shortest period the refresher sleeps between ticks.
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Owns the background refresh task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct RefreshHandle {
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Spawn a task that sleeps `period`, then awaits `tick`, forever, until
    /// `tick` returns [`ControlFlow::Break`] or the handle is stopped.
    ///
    /// Periods below [`MIN_REFRESH_PERIOD`] are raised to it.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let period = period.max(MIN_REFRESH_PERIOD);
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if tick().await.is_break() {
                    debug!("refresh loop finished");
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    /// Whether the task is still scheduled.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the task and wait until it is gone.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancelled is the expected outcome.
            let _ = task.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn keys_are_namespaced_by_kind() {
        assert_eq!(cache_key(CacheKind::Sheet, "Выборка"), "sheet::Выборка");
        assert_eq!(cache_key(CacheKind::SheetHeader, "Выборка"), "sheet_header::Выборка");
    }

    #[tokio::test(start_paused = true)]
    async fn set_then_get_until_ttl_passes() {
        let cache = TtlCache::new(Duration::from_secs(120));
        cache.set("k", 7);
        assert_eq!(cache.get("k"), Some(7));

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(cache.get("k"), Some(7), "entry is valid at exactly ttl");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k"), None);
        // expired entries are not evicted by reads
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_restarts_clock() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("k", "old");
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", "new");
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some("new"));
    }

    #[test]
    fn clear_removes_unrelated_keys() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(cache_key(CacheKind::Sheet, "a"), 1);
        cache.set("something-else", 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("something-else"), None);
    }

    #[test]
    fn concurrent_access_does_not_corrupt() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("k{}", i % 10), t * 1000 + i);
                        let _ = cache.get("k3");
                        if i % 50 == 0 {
                            cache.clear();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("worker panicked");
        }
        assert!(cache.len() <= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_ticks_every_period_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = RefreshHandle::spawn(Duration::from_secs(120), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        assert!(handle.is_running());
        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_is_raised_to_minimum() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = RefreshHandle::spawn(Duration::ZERO, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        for _ in 0..200 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(MIN_REFRESH_PERIOD + Duration::from_millis(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresher_exits_on_break() {
        let handle = RefreshHandle::spawn(Duration::from_secs(1), || async { ControlFlow::Break(()) });
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(!handle.is_running());
    }
}
