//! Admission control: the max-domains cap and the max-relevant-domains →
//! restriction state machine from spec §4.7.
//!
//! Restriction is one-way: once triggered, `try_to_restrict_domains` keeps
//! returning `true` and the state never reverts, mirroring the queue
//! key state machine's `frozen present` terminal state.

use crate::domain::registered_domain;
use crate::error::Result;
use crate::store::StoreGateway;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub struct AdmissionController {
    store: Arc<dyn StoreGateway>,
    prefix: String,
    max_domains: Option<u64>,
    max_relevant_domains: Option<u64>,
    restrict_delay_secs: u64,
    restricted: AtomicBool,
    first_relevant_at: AtomicU64,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        prefix: impl Into<String>,
        max_domains: Option<u64>,
        max_relevant_domains: Option<u64>,
        restrict_delay_secs: u64,
    ) -> Self {
        AdmissionController {
            store,
            prefix: prefix.into(),
            max_domains,
            max_relevant_domains,
            restrict_delay_secs,
            restricted: AtomicBool::new(false),
            first_relevant_at: AtomicU64::new(0),
        }
    }

    fn relevant_domains_key(&self) -> String {
        format!("{}:relevant-domains", self.prefix)
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted.load(Ordering::SeqCst)
    }

    /// Decide whether a push for `queue_key` may proceed, given the queues
    /// index currently holds `queues_index_cardinality` keys and
    /// `key_already_present` is whether `queue_key` is already one of them.
    pub fn admit_push(
        &self,
        queue_key: &str,
        queues_index_cardinality: u64,
        key_already_present: bool,
    ) -> bool {
        if !key_already_present {
            if let Some(cap) = self.max_domains {
                if queues_index_cardinality >= cap {
                    return false;
                }
            }
            if self.is_restricted() {
                return false;
            }
        }
        let _ = queue_key;
        true
    }

    /// Record that `url` was judged relevant (by an external scorer), and
    /// evaluate whether restriction should activate.
    pub async fn page_is_relevant(&self, url: &str, _score: f64) -> Result<()> {
        let Some(domain) = registered_domain(url) else {
            return Ok(());
        };
        let added = self.store.sadd(&self.relevant_domains_key(), &domain).await?;
        if added {
            self.first_relevant_at
                .compare_exchange(0, now_unix(), Ordering::SeqCst, Ordering::SeqCst)
                .ok();
        }
        self.try_to_restrict_domains().await?;
        Ok(())
    }

    /// Idempotent: once the relevant-domain set reaches `max_relevant_domains`
    /// and at least `restrict_delay_secs` have elapsed since the first
    /// relevant domain was recorded, flip to the restricted state. Safe to
    /// call on every pop.
    pub async fn try_to_restrict_domains(&self) -> Result<bool> {
        if self.is_restricted() {
            return Ok(true);
        }
        let Some(cap) = self.max_relevant_domains else {
            return Ok(false);
        };
        let count = self.store.scard(&self.relevant_domains_key()).await? as u64;
        if count < cap {
            return Ok(false);
        }
        let first_at = self.first_relevant_at.load(Ordering::SeqCst);
        if first_at == 0 {
            return Ok(false);
        }
        if now_unix().saturating_sub(first_at) < self.restrict_delay_secs {
            return Ok(false);
        }
        if self
            .restricted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!(prefix = %self.prefix, "restricting domains: no new queue keys will be admitted");
        }
        Ok(true)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGateway;

    #[test]
    fn admit_push_rejects_new_domain_at_cap() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let ctrl = AdmissionController::new(store, "P", Some(2), None, 0);
        assert!(ctrl.admit_push("P:domain:a.com", 1, false));
        assert!(!ctrl.admit_push("P:domain:c.com", 2, false));
        // Already-present keys are always admitted regardless of cap.
        assert!(ctrl.admit_push("P:domain:a.com", 2, true));
    }

    #[tokio::test]
    async fn restriction_activates_after_cap_and_delay() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let ctrl = AdmissionController::new(store, "P", None, Some(2), 0);
        ctrl.page_is_relevant("http://a.com", 1.0).await.unwrap();
        assert!(!ctrl.is_restricted());
        ctrl.page_is_relevant("http://b.com", 1.0).await.unwrap();
        assert!(ctrl.is_restricted());
    }

    #[tokio::test]
    async fn restriction_waits_for_delay() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let ctrl = AdmissionController::new(store, "P", None, Some(1), 3600);
        ctrl.page_is_relevant("http://a.com", 1.0).await.unwrap();
        assert!(!ctrl.is_restricted(), "delay has not elapsed yet");
    }

    #[tokio::test]
    async fn restricted_state_blocks_new_domains_only() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let ctrl = AdmissionController::new(store, "P", None, Some(1), 0);
        ctrl.page_is_relevant("http://a.com", 1.0).await.unwrap();
        assert!(ctrl.is_restricted());
        assert!(!ctrl.admit_push("P:domain:new.com", 5, false));
        assert!(ctrl.admit_push("P:domain:existing.com", 5, true));
    }
}
