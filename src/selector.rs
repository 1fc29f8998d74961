//! Selection of candidate queues: the Worker Directory → Domain Partitioner
//! → Timed Cache → sampling policy pipeline described in spec §4.6.
//!
//! The "variants" (uniform, softmax, batched, batched-softmax) are a single
//! enum rather than four subclasses of a shared base — there's no behavior
//! beyond `sample_one`/`sample_many` that needs overriding per variant.

use crate::cache::TimedCache;
use crate::config::FrontierConfig;
use crate::domain::queue_key_domain;
use crate::error::Result;
use crate::partitioner;
use crate::store::StoreGateway;
use crate::worker_directory::WorkerDirectory;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    Uniform,
    Softmax,
}

/// Per-domain in-flight slot bookkeeping, mirroring the downloader
/// middleware's `defaultdict(set)` of in-flight requests per domain. Kept
/// deliberately minimal: the crawl engine that would actually occupy and
/// release slots is out of scope here, so this only has to support the
/// Selector's "prefer domains with room" filter.
#[derive(Default)]
pub struct SlotTracker {
    in_flight: Mutex<HashMap<String, usize>>,
}

impl SlotTracker {
    pub fn new() -> Self {
        SlotTracker::default()
    }

    pub fn mark_in_flight(&self, domain: &str) {
        *self.in_flight.lock().unwrap().entry(domain.to_string()).or_insert(0) += 1;
    }

    pub fn release(&self, domain: &str) {
        let mut map = self.in_flight.lock().unwrap();
        if let Some(count) = map.get_mut(domain) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                map.remove(domain);
            }
        }
    }

    fn has_free_slot(&self, domain: &str, limit: usize) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .get(domain)
            .map(|count| *count < limit)
            .unwrap_or(true)
    }
}

const MAX_SELECT_RETRIES: usize = 5;

pub struct Selector {
    store: Arc<dyn StoreGateway>,
    directory: Arc<WorkerDirectory>,
    slots: Arc<SlotTracker>,
    policy: SelectionPolicy,
    config: FrontierConfig,
    cache: Mutex<TimedCache<(u32, u32, u64), Vec<(String, f64)>>>,
}

impl Selector {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        directory: Arc<WorkerDirectory>,
        slots: Arc<SlotTracker>,
        policy: SelectionPolicy,
        config: FrontierConfig,
    ) -> Self {
        let cache = TimedCache::new(
            std::time::Duration::from_secs_f64(config.queue_cache_time_secs),
            std::time::Duration::from_secs_f64(config.max_cache_time_secs),
            config.cache_run_time_multiplier,
        )
        .with_skip_cache(config.skip_cache);
        Selector {
            store,
            directory,
            slots,
            policy,
            config,
            cache: Mutex::new(cache),
        }
    }

    fn queues_index_key(&self) -> String {
        format!("{}:queues", self.config.prefix)
    }

    fn queues_generation_key(&self) -> String {
        format!("{}:queues-gen", self.config.prefix)
    }

    /// Current value of the queues-index generation counter (bumped by
    /// `Queue` every time a queue key is added to or evicted from the
    /// index). Folded into the cache key below so a newly-pushed domain is
    /// never hidden behind the cache's wall-clock TTL.
    async fn current_generation(&self) -> Result<u64> {
        Ok(self
            .store
            .get(&self.queues_generation_key())
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0))
    }

    /// This worker's subset of the queues index, with scores, through the
    /// timed cache keyed by `(idx, n_workers, generation)`. The generation
    /// component is the original crawler's `queues-id` bump-on-membership-change
    /// mechanism: any push or eviction that adds/removes a queue key changes
    /// the generation, which misses the cache immediately regardless of how
    /// much of the wall-clock TTL remains. Scores changing on an existing
    /// member (a plain re-prioritization) does not bump it, since that
    /// doesn't change which queues this worker owns.
    async fn candidate_subset(&self, idx: u32, n: u32) -> Result<Vec<(String, f64)>> {
        let generation = self.current_generation().await?;
        let key = (idx, n, generation);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(cached);
        }

        let start = Instant::now();
        let all = self.store.zrange_withscores(&self.queues_index_key(), 0, -1).await?;
        let subset: Vec<(String, f64)> = all
            .into_iter()
            .filter(|(k, _)| partitioner::owns(k, idx, n))
            .collect();
        let runtime = start.elapsed();
        if runtime > std::time::Duration::from_millis(100) {
            warn!(?runtime, "selector candidate-subset computation exceeded 100ms");
        }

        self.cache.lock().unwrap().put(key, subset.clone(), runtime);
        Ok(subset)
    }

    /// Narrow `candidates` to the ones with a free per-domain slot. Falls
    /// back to the full set if none qualify (spec §9: "use them anyway").
    fn available_subset(&self, candidates: &[(String, f64)]) -> Vec<(String, f64)> {
        let available: Vec<(String, f64)> = candidates
            .iter()
            .filter(|(key, _)| {
                self.slots
                    .has_free_slot(queue_key_domain(key), self.config.concurrent_requests_per_domain)
            })
            .cloned()
            .collect();
        if available.is_empty() {
            candidates.to_vec()
        } else {
            available
        }
    }

    fn sample_one(&self, candidates: &[(String, f64)]) -> String {
        match self.policy {
            SelectionPolicy::Uniform => {
                let idx = rand::thread_rng().gen_range(0..candidates.len());
                candidates[idx].0.clone()
            }
            SelectionPolicy::Softmax => {
                let probs = softmax_probs(candidates, self.config.softmax_temperature());
                let dist = WeightedIndex::new(&probs).unwrap_or_else(|_| {
                    WeightedIndex::new(vec![1.0; candidates.len()]).unwrap()
                });
                let idx = dist.sample(&mut rand::thread_rng());
                candidates[idx].0.clone()
            }
        }
    }

    /// Select one queue key for a single `pop`. Verifies the chosen queue
    /// is non-empty (a race may have drained it between selection and the
    /// cardinality check); on an empty hit, evicts it from the queues index
    /// and retries, bounded by `MAX_SELECT_RETRIES`.
    pub async fn select_one(&self) -> Result<Option<String>> {
        self.directory.heartbeat().await?;
        let (idx, n) = self.directory.discover().await?;
        let candidates = self.candidate_subset(idx, n).await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut pool = self.available_subset(&candidates);

        for _ in 0..MAX_SELECT_RETRIES {
            if pool.is_empty() {
                return Ok(None);
            }
            let chosen = self.sample_one(&pool);
            let cardinality = self.store.zcard(&chosen).await?;
            if cardinality > 0 {
                return Ok(Some(chosen));
            }
            warn!(queue = %chosen, "selected queue was empty, evicting from index and retrying");
            self.store.zrem(&self.queues_index_key(), &chosen).await?;
            self.store.incr(&self.queues_generation_key()).await?;
            pool.retain(|(k, _)| k != &chosen);
        }
        Ok(None)
    }

    /// Sample `batch_size` queue keys with replacement according to the
    /// selection policy, grouped by key with per-key counts. The softmax
    /// variant enforces `max_queue_n` and falls back to non-replacement
    /// sampling + round-robin fill when probabilities degenerate (spec
    /// §4.6).
    pub async fn select_many(&self, batch_size: usize) -> Result<Vec<(String, usize)>> {
        self.directory.heartbeat().await?;
        let (idx, n) = self.directory.discover().await?;
        let candidates = self.candidate_subset(idx, n).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.available_subset(&candidates);

        let counts = match self.policy {
            SelectionPolicy::Uniform => sample_many_uniform(&pool, batch_size),
            SelectionPolicy::Softmax => {
                sample_many_softmax(&pool, batch_size, self.config.softmax_temperature(), self.config.max_queue_n())
            }
        };
        Ok(counts.into_iter().collect())
    }
}

/// Numerically stable `softmax(-score / temperature)` over `candidates`,
/// where `score = -priority` so `-score == priority`. Falls back to uniform
/// over the support if every probability would round to zero.
fn softmax_probs(candidates: &[(String, f64)], temperature: f64) -> Vec<f64> {
    let t = if temperature.abs() < f64::EPSILON { 1.0 } else { temperature };
    let logits: Vec<f64> = candidates.iter().map(|(_, score)| -score / t).collect();
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        let uniform = 1.0 / candidates.len() as f64;
        return vec![uniform; candidates.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

fn sample_many_uniform(candidates: &[(String, f64)], batch_size: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    if candidates.is_empty() {
        return counts;
    }
    let mut rng = rand::thread_rng();
    for _ in 0..batch_size {
        let idx = rng.gen_range(0..candidates.len());
        *counts.entry(candidates[idx].0.clone()).or_insert(0) += 1;
    }
    counts
}

fn sample_many_softmax(
    candidates: &[(String, f64)],
    batch_size: usize,
    temperature: f64,
    max_queue_n: usize,
) -> HashMap<String, usize> {
    if candidates.is_empty() {
        return HashMap::new();
    }
    let probs = softmax_probs(candidates, temperature);
    let support: Vec<usize> = probs
        .iter()
        .enumerate()
        .filter(|(_, p)| **p > 0.0)
        .map(|(i, _)| i)
        .collect();

    let required_unique = batch_size.div_ceil(max_queue_n.max(1));
    if support.len() < required_unique {
        return fallback_sample(candidates, &support, batch_size);
    }

    let dist = match WeightedIndex::new(&probs) {
        Ok(d) => d,
        Err(_) => return fallback_sample(candidates, &support, batch_size),
    };
    let mut rng = rand::thread_rng();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut remaining = batch_size;
    let max_attempts = batch_size.saturating_mul(20).max(100);
    let mut attempts = 0;
    while remaining > 0 && attempts < max_attempts {
        attempts += 1;
        let idx = dist.sample(&mut rng);
        let key = &candidates[idx].0;
        let entry = counts.entry(key.clone()).or_insert(0);
        if *entry < max_queue_n {
            *entry += 1;
            remaining -= 1;
        }
    }
    if remaining > 0 {
        round_robin_fill(&mut counts, &support, candidates, remaining);
    }
    counts
}

/// Degenerate-probability fallback: sample without replacement from the
/// non-zero support, then fill the remainder by round-robin over that same
/// support. Guarantees `batch_size` is reached (when the support is
/// non-empty) regardless of how skewed the scores are.
fn fallback_sample(
    candidates: &[(String, f64)],
    support: &[usize],
    batch_size: usize,
) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    if support.is_empty() {
        return counts;
    }
    let mut order = support.to_vec();
    order.shuffle(&mut rand::thread_rng());

    let mut remaining = batch_size;
    for idx in &order {
        if remaining == 0 {
            break;
        }
        counts.insert(candidates[*idx].0.clone(), 1);
        remaining -= 1;
    }
    if remaining > 0 {
        round_robin_fill(&mut counts, support, candidates, remaining);
    }
    counts
}

fn round_robin_fill(
    counts: &mut HashMap<String, usize>,
    support: &[usize],
    candidates: &[(String, f64)],
    mut remaining: usize,
) {
    if support.is_empty() {
        return;
    }
    let mut i = 0;
    while remaining > 0 {
        let idx = support[i % support.len()];
        *counts.entry(candidates[idx].0.clone()).or_insert(0) += 1;
        remaining -= 1;
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGateway;

    fn candidates(n: usize) -> Vec<(String, f64)> {
        (0..n).map(|i| (format!("q{}", i), -(i as f64))).collect()
    }

    #[test]
    fn softmax_probs_sum_to_one() {
        let c = candidates(5);
        let probs = softmax_probs(&c, 1000.0);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn softmax_falls_back_to_uniform_on_zero_temperature_extreme() {
        // one score is astronomically better than the rest; at a tiny
        // temperature the exponentials would all saturate to 0 or inf if not
        // for the max-subtraction stabilization.
        let c = vec![
            ("hot".to_string(), -1.0e8),
            ("cold1".to_string(), 0.0),
            ("cold2".to_string(), 0.0),
        ];
        let probs = softmax_probs(&c, 0.0001);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(probs[0] > 0.99);
    }

    #[test]
    fn uniform_sampling_hits_every_candidate_given_enough_draws() {
        let c = candidates(4);
        let counts = sample_many_uniform(&c, 400);
        assert_eq!(counts.len(), 4);
    }

    #[test]
    fn degenerate_softmax_batch_still_spans_many_queues() {
        let mut c = vec![("hot".to_string(), -1.0e8)];
        for i in 0..99 {
            c.push((format!("cold{}", i), 0.0));
        }
        let counts = sample_many_softmax(&c, 50, 1000.0, 5);
        let total: usize = counts.values().sum();
        assert_eq!(total, 50);
        assert!(counts.contains_key("hot"));
        assert!(counts.len() > 10, "expected broad spread, got {} keys", counts.len());
    }

    #[tokio::test]
    async fn candidate_subset_sees_new_domain_despite_long_cache_ttl() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        store.zadd("P:queues", "P:domain:a.com", -1.0).await.unwrap();
        let directory = Arc::new(WorkerDirectory::register(store.clone(), "P", 120).await.unwrap());
        let mut config = FrontierConfig::for_prefix("P");
        config.max_cache_time_secs = 1800.0;
        config.queue_cache_time_secs = 1800.0;
        let selector = Selector::new(
            store.clone(),
            directory,
            Arc::new(SlotTracker::new()),
            SelectionPolicy::Uniform,
            config,
        );

        let first = selector.candidate_subset(0, 1).await.unwrap();
        assert_eq!(first.len(), 1);

        // A second worker's push adds a new queue key and bumps the
        // generation counter directly, without going through `Selector`.
        store.zadd("P:queues", "P:domain:b.com", -1.0).await.unwrap();
        store.incr("P:queues-gen").await.unwrap();

        let second = selector.candidate_subset(0, 1).await.unwrap();
        assert_eq!(second.len(), 2, "new domain should be visible immediately despite a 1800s cache TTL");
    }

    #[tokio::test]
    async fn select_one_returns_none_when_no_queues_exist() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let directory = Arc::new(
            WorkerDirectory::register(store.clone(), "P", 120).await.unwrap(),
        );
        let selector = Selector::new(
            store,
            directory,
            Arc::new(SlotTracker::new()),
            SelectionPolicy::Uniform,
            FrontierConfig::for_prefix("P"),
        );
        assert_eq!(selector.select_one().await.unwrap(), None);
    }
}
