//! Prometheus-format counters and gauges for the frontier, exported as
//! OpenMetrics text the way this codebase's other long-running processes
//! expose a `/metrics` endpoint.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PrefixLabel {
    pub prefix: String,
}

pub struct Metrics {
    registry: Registry,
    pushes_total: Family<PrefixLabel, Counter>,
    pushes_rejected_total: Family<PrefixLabel, Counter>,
    pops_total: Family<PrefixLabel, Counter>,
    corrupt_members_total: Family<PrefixLabel, Counter>,
    queue_length: Family<PrefixLabel, Gauge>,
    domain_count: Family<PrefixLabel, Gauge>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let pushes_total = Family::<PrefixLabel, Counter>::default();
        registry.register(
            "frontier_pushes_total",
            "Requests accepted by push()",
            pushes_total.clone(),
        );

        let pushes_rejected_total = Family::<PrefixLabel, Counter>::default();
        registry.register(
            "frontier_pushes_rejected_total",
            "Requests dropped by admission control",
            pushes_rejected_total.clone(),
        );

        let pops_total = Family::<PrefixLabel, Counter>::default();
        registry.register(
            "frontier_pops_total",
            "Requests returned by pop() and pop_multi()",
            pops_total.clone(),
        );

        let corrupt_members_total = Family::<PrefixLabel, Counter>::default();
        registry.register(
            "frontier_corrupt_members_total",
            "Encoded members dropped for failing to decode",
            corrupt_members_total.clone(),
        );

        let queue_length = Family::<PrefixLabel, Gauge>::default();
        registry.register(
            "frontier_queue_length",
            "Total encoded requests across all per-domain queues",
            queue_length.clone(),
        );

        let domain_count = Family::<PrefixLabel, Gauge>::default();
        registry.register(
            "frontier_domain_count",
            "Number of distinct domains present in the queues index",
            domain_count.clone(),
        );

        Metrics {
            registry,
            pushes_total,
            pushes_rejected_total,
            pops_total,
            corrupt_members_total,
            queue_length,
            domain_count,
        }
    }

    pub fn record_push(&self, prefix: &str) {
        self.pushes_total
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .inc();
    }

    pub fn record_push_rejected(&self, prefix: &str) {
        self.pushes_rejected_total
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .inc();
    }

    pub fn record_pops(&self, prefix: &str, n: u64) {
        self.pops_total
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .inc_by(n);
    }

    pub fn record_corrupt_member(&self, prefix: &str) {
        self.corrupt_members_total
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .inc();
    }

    pub fn set_queue_length(&self, prefix: &str, len: i64) {
        self.queue_length
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .set(len);
    }

    pub fn set_domain_count(&self, prefix: &str, count: i64) {
        self.domain_count
            .get_or_create(&PrefixLabel { prefix: prefix.to_string() })
            .set(count);
    }

    /// Render the registry as OpenMetrics text.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).expect("encoding metrics should not fail");
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_counter_increments_per_prefix() {
        let metrics = Metrics::new();
        metrics.record_push("P");
        metrics.record_push("P");
        metrics.record_push("Q");
        let text = metrics.encode();
        assert!(text.contains("frontier_pushes_total"));
    }

    #[test]
    fn queue_length_gauge_reflects_last_set_value() {
        let metrics = Metrics::new();
        metrics.set_queue_length("P", 42);
        let text = metrics.encode();
        assert!(text.contains("frontier_queue_length"));
        assert!(text.contains("42"));
    }

    #[test]
    fn encode_produces_openmetrics_eof_marker() {
        let metrics = Metrics::new();
        let text = metrics.encode();
        assert!(text.trim_end().ends_with("# EOF"));
    }
}
