//! Queue Core: per-domain priority queues plus the global queues index,
//! wired together from the Codec, Store Gateway, Domain Partitioner,
//! Selector, and Admission Controller (spec §4.5).

use crate::admission::AdmissionController;
use crate::codec;
use crate::config::FrontierConfig;
use crate::domain::registered_domain;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::request::Request;
use crate::selector::{Selector, SelectionPolicy, SlotTracker};
use crate::sidetables::{LoginCredentials, SideTables};
use crate::store::StoreGateway;
use crate::worker_directory::WorkerDirectory;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct QueueStatsEntry {
    pub key: String,
    pub priority: f64,
    pub cardinality: i64,
}

#[derive(Debug, Clone)]
pub struct QueueStats {
    pub len: i64,
    pub n_domains: i64,
    pub queues: Vec<QueueStatsEntry>,
}

pub struct Queue {
    store: Arc<dyn StoreGateway>,
    config: FrontierConfig,
    admission: AdmissionController,
    selector: Selector,
    sidetables: SideTables,
    metrics: Arc<Metrics>,
}

impl Queue {
    pub async fn new(
        store: Arc<dyn StoreGateway>,
        config: FrontierConfig,
        policy: SelectionPolicy,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let directory = Arc::new(
            WorkerDirectory::register(store.clone(), config.prefix.clone(), config.alive_timeout_secs).await?,
        );
        let admission = AdmissionController::new(
            store.clone(),
            config.prefix.clone(),
            config.max_domains,
            config.max_relevant_domains,
            config.restrict_delay_secs,
        );
        let selector = Selector::new(
            store.clone(),
            directory,
            Arc::new(SlotTracker::new()),
            policy,
            config.clone(),
        );
        let sidetables = SideTables::new(store.clone(), config.prefix.clone());
        Ok(Queue {
            store,
            config,
            admission,
            selector,
            sidetables,
            metrics,
        })
    }

    fn queue_key(&self, domain: &str) -> String {
        format!("{}:domain:{}", self.config.prefix, domain)
    }

    fn queues_index_key(&self) -> String {
        format!("{}:queues", self.config.prefix)
    }

    fn len_key(&self) -> String {
        format!("{}:len", self.config.prefix)
    }

    /// Bumped every time a queue key is added to or evicted from the
    /// queues index, so `Selector`'s timed cache can invalidate on
    /// membership changes instead of waiting out its wall-clock TTL.
    fn queues_generation_key(&self) -> String {
        format!("{}:queues-gen", self.config.prefix)
    }

    /// Pure function exposed for tests and operational tools (spec §6).
    pub fn url_queue_key(&self, url: &str) -> Option<String> {
        crate::domain::url_queue_key(&self.config.prefix, url)
    }

    /// Pure function exposed for tests and operational tools (spec §6).
    pub fn queue_key_domain<'a>(&self, key: &'a str) -> &'a str {
        crate::domain::queue_key_domain(key)
    }

    /// Admit-and-store `request`. Returns `false` iff admission rejected it;
    /// a malformed URL (no extractable registered domain) is also a
    /// rejection rather than an error.
    pub async fn push(&self, request: &Request) -> Result<bool> {
        let Some(domain) = registered_domain(&request.url) else {
            self.metrics.record_push_rejected(&self.config.prefix);
            return Ok(false);
        };
        let queue_key = self.queue_key(&domain);
        let queues_index_key = self.queues_index_key();

        let cardinality = self.store.zcard(&queues_index_key).await? as u64;
        let key_present = self.store.zrank(&queues_index_key, &queue_key).await?.is_some();
        if !self.admission.admit_push(&queue_key, cardinality, key_present) {
            self.metrics.record_push_rejected(&self.config.prefix);
            return Ok(false);
        }

        let score = -(request.priority as f64).min(self.config.max_score);
        let member = codec::encode(request, self.config.compress_urls);
        let outcome = self
            .store
            .push_member(&queue_key, &queues_index_key, &member, score)
            .await?;

        if outcome.member_added {
            self.store.incr(&self.len_key()).await?;
        }
        if outcome.queue_key_added {
            info!(queue = %queue_key, "ADD queue");
            self.store.incr(&self.queues_generation_key()).await?;
        }
        self.metrics.record_push(&self.config.prefix);
        Ok(true)
    }

    /// Select and pop a single request. `timeout` is accepted for interface
    /// compatibility and ignored (spec §5: pop is non-blocking at this
    /// layer).
    pub async fn pop(&self, _timeout: Option<std::time::Duration>) -> Result<Option<Request>> {
        self.admission.try_to_restrict_domains().await?;
        let Some(key) = self.selector.select_one().await? else {
            return Ok(None);
        };
        let popped = self.pop_from_queue(&key, 1).await?;
        Ok(popped.into_iter().next())
    }

    /// Batched pop: sample `batch_size` queue keys with replacement, group
    /// by key, drain each group in one round trip. Per-group results are
    /// already in highest-priority-first order from `read_and_remove_top`,
    /// so unlike the pipelined-stack approach this doesn't need to reverse
    /// each group before concatenating.
    pub async fn pop_multi(&self) -> Result<Vec<Request>> {
        self.admission.try_to_restrict_domains().await?;
        let counts = self.selector.select_many(self.config.batch_size).await?;
        let mut results = Vec::new();
        for (key, count) in counts {
            let popped = self.pop_from_queue(&key, count).await?;
            results.extend(popped);
        }
        Ok(results)
    }

    /// Atomically read the top `n+1` members of `key` and remove the top
    /// `n`; upsert or evict the queues-index entry depending on whether a
    /// new top score remains (spec §4.5).
    async fn pop_from_queue(&self, key: &str, n: usize) -> Result<Vec<Request>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let read = self.store.read_and_remove_top(key, n).await?;
        let removed_count = read.len().min(n);

        if removed_count > 0 {
            self.store.decr_by(&self.len_key(), removed_count as i64).await?;
        }

        if read.len() > n {
            let (_, new_top_score) = read[n];
            self.store.zadd(&self.queues_index_key(), key, new_top_score).await?;
        } else {
            self.store.zrem(&self.queues_index_key(), key).await?;
            self.store.incr(&self.queues_generation_key()).await?;
        }

        let mut requests = Vec::with_capacity(removed_count);
        for (member, _) in read.into_iter().take(n) {
            match codec::decode(&member, self.config.compress_urls) {
                Ok(request) => requests.push(request),
                Err(err) => {
                    error!(%err, queue = %key, "dropping corrupt encoded request");
                    self.metrics.record_corrupt_member(&self.config.prefix);
                }
            }
        }
        self.metrics.record_pops(&self.config.prefix, requests.len() as u64);
        Ok(requests)
    }

    /// Total encoded requests across all per-domain queues (may lag
    /// transiently behind concurrent pushes/pops).
    pub async fn len(&self) -> Result<i64> {
        Ok(self
            .store
            .get(&self.len_key())
            .await?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0))
    }

    /// Delete every queue, index, and worker-registry key under this
    /// prefix.
    pub async fn clear(&self) -> Result<()> {
        let queues = self.store.zrange_withscores(&self.queues_index_key(), 0, -1).await?;
        let mut keys: Vec<String> = queues.into_iter().map(|(key, _)| key).collect();
        keys.push(self.queues_index_key());
        keys.push(self.len_key());
        keys.push(self.queues_generation_key());
        keys.push(format!("{}:workers", self.config.prefix));
        keys.push(format!("{}:relevant-domains", self.config.prefix));
        keys.push(format!("{}:hints", self.config.prefix));
        self.store.del(&keys).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let len = self.len().await?;
        let queues = self.store.zrange_withscores(&self.queues_index_key(), 0, -1).await?;
        let mut entries = Vec::with_capacity(queues.len());
        for (key, score) in &queues {
            let cardinality = self.store.zcard(key).await?;
            entries.push(QueueStatsEntry {
                key: key.clone(),
                priority: -score,
                cardinality,
            });
        }
        self.metrics.set_queue_length(&self.config.prefix, len);
        self.metrics.set_domain_count(&self.config.prefix, queues.len() as i64);
        Ok(QueueStats {
            len,
            n_domains: queues.len() as i64,
            queues: entries,
        })
    }

    pub async fn page_is_relevant(&self, url: &str, score: f64) -> Result<()> {
        self.admission.page_is_relevant(url, score).await
    }

    pub async fn add_hint_url(&self, url: &str) -> Result<()> {
        self.sidetables.add_hint_url(url).await
    }

    pub async fn remove_hint_url(&self, url: &str) -> Result<()> {
        self.sidetables.remove_hint_url(url).await
    }

    pub async fn add_login_credentials(&self, url_prefix: &str, login: &str, password: &str) -> Result<()> {
        self.sidetables.add_login_credentials(url_prefix, login, password).await
    }

    pub async fn get_login_credentials(&self, url_prefix: &str) -> Result<Option<LoginCredentials>> {
        self.sidetables.get_login_credentials(url_prefix).await
    }
}
