//! Self-tuning memoizer: keeps selection's O(queues) fan-out off the hot
//! path by caching the last computed value and adapting how long it stays
//! fresh to how expensive it was to compute.
//!
//! Modeled as an explicit struct rather than a closure over mutable free
//! variables, per the observation that a memoizer carrying a caller-supplied
//! invalidation key needs its state (`value`, `expiry`, `last_runtime`)
//! named, not hidden in a closure environment.

use std::time::{Duration, Instant};

/// Capacity-1 cache keyed on a caller-supplied `time_key` (e.g. `(idx,
/// n_workers)`): a new key invalidates the cached value immediately, a
/// repeated key is still subject to the adaptive TTL.
pub struct TimedCache<K, V> {
    initial_lifetime: Duration,
    max_lifetime: Duration,
    run_time_multiplier: f64,
    skip_cache: bool,
    entry: Option<Entry<K, V>>,
}

struct Entry<K, V> {
    key: K,
    value: V,
    computed_at: Instant,
    lifetime: Duration,
}

impl<K: PartialEq + Clone, V: Clone> TimedCache<K, V> {
    pub fn new(initial_lifetime: Duration, max_lifetime: Duration, run_time_multiplier: f64) -> Self {
        TimedCache {
            initial_lifetime,
            max_lifetime,
            run_time_multiplier,
            skip_cache: false,
            entry: None,
        }
    }

    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }

    /// Return the cached value for `time_key` if present and still fresh.
    /// Split out from [`Self::get_or_compute`] so callers whose compute step
    /// is `async` can check-then-await-then-store instead of needing a
    /// synchronous closure.
    pub fn get(&self, time_key: &K) -> Option<V> {
        if self.skip_cache {
            return None;
        }
        let entry = self.entry.as_ref()?;
        if entry.key == *time_key && entry.computed_at.elapsed() < entry.lifetime {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Record a freshly computed `value` for `time_key`, given how long it
    /// took to compute.
    pub fn put(&mut self, time_key: K, value: V, runtime: Duration) {
        let lifetime = Duration::from_secs_f64(
            (runtime.as_secs_f64() * self.run_time_multiplier)
                .min(self.max_lifetime.as_secs_f64())
                .max(self.initial_lifetime.as_secs_f64()),
        );
        self.entry = Some(Entry {
            key: time_key,
            value,
            computed_at: Instant::now(),
            lifetime,
        });
    }

    /// Return the cached value for `time_key` if still fresh, otherwise
    /// invoke `compute`, time it, and cache the result under the new
    /// lifetime `min(max_lifetime, runtime * run_time_multiplier)` floored
    /// at `initial_lifetime`.
    pub fn get_or_compute<F>(&mut self, time_key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if !self.skip_cache {
            if let Some(entry) = &self.entry {
                if entry.key == time_key && entry.computed_at.elapsed() < entry.lifetime {
                    return entry.value.clone();
                }
            }
        }

        let start = Instant::now();
        let value = compute();
        let runtime = start.elapsed();

        let lifetime = Duration::from_secs_f64(
            (runtime.as_secs_f64() * self.run_time_multiplier)
                .min(self.max_lifetime.as_secs_f64())
                .max(self.initial_lifetime.as_secs_f64()),
        );

        self.entry = Some(Entry {
            key: time_key,
            value: value.clone(),
            computed_at: start,
            lifetime,
        });
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn recomputes_on_new_time_key() {
        let mut cache: TimedCache<u32, u32> =
            TimedCache::new(Duration::from_secs(10), Duration::from_secs(100), 20.0);
        let calls = Cell::new(0);
        let v1 = cache.get_or_compute(1, || {
            calls.set(calls.get() + 1);
            calls.get()
        });
        let v2 = cache.get_or_compute(2, || {
            calls.set(calls.get() + 1);
            calls.get()
        });
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn reuses_cached_value_within_lifetime_for_same_key() {
        let mut cache: TimedCache<u32, u32> =
            TimedCache::new(Duration::from_secs(10), Duration::from_secs(100), 20.0);
        let calls = Cell::new(0);
        for _ in 0..5 {
            cache.get_or_compute(1, || {
                calls.set(calls.get() + 1);
                calls.get()
            });
        }
        assert_eq!(calls.get(), 1, "same key within lifetime should not recompute");
    }

    #[test]
    fn skip_cache_always_recomputes() {
        let mut cache: TimedCache<u32, u32> =
            TimedCache::new(Duration::from_secs(10), Duration::from_secs(100), 20.0)
                .with_skip_cache(true);
        let calls = Cell::new(0);
        for _ in 0..3 {
            cache.get_or_compute(1, || {
                calls.set(calls.get() + 1);
                calls.get()
            });
        }
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn lifetime_floors_at_initial_cache_time() {
        let mut cache: TimedCache<u32, u32> =
            TimedCache::new(Duration::from_secs(10), Duration::from_secs(100), 20.0);
        // An essentially-instant compute should still cache for >= initial_lifetime.
        cache.get_or_compute(1, || 42);
        let calls = Cell::new(0);
        let v = cache.get_or_compute(1, || {
            calls.set(calls.get() + 1);
            99
        });
        assert_eq!(v, 42);
        assert_eq!(calls.get(), 0);
    }
}
