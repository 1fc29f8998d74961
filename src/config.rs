//! Frontier configuration: every tunable named in spec §6's option table,
//! loadable from CLI flags, environment variables, or defaults, the way this
//! codebase's other binaries build their `clap::Parser` config structs.
//!
//! `FrontierConfig` additionally derives `serde::{Serialize, Deserialize}`
//! so it can be embedded as a `[frontier]` table inside a larger
//! crawl-engine TOML config (the same `toml`-backed pattern the teacher's
//! `project::config::ProjectConfig` uses for its own campaign files),
//! independent of the `clap`/env path.

use crate::error::{FrontierError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `DD_PRIORITY_MULTIPLIER` from the original crawler's settings module:
/// priorities are scaled by this before being folded into the softmax
/// temperature, so a `balancing_temperature` of `0.1` means something
/// consistent regardless of how priorities are scaled upstream.
pub const DEFAULT_PRIORITY_MULTIPLIER: f64 = 10_000.0;
pub const DEFAULT_BALANCING_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_SCORE: f64 = 10.0 * DEFAULT_PRIORITY_MULTIPLIER;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_CONCURRENT_REQUESTS_PER_DOMAIN: usize = 10;
pub const DEFAULT_ALIVE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_QUEUE_CACHE_TIME_SECS: f64 = 0.5;
pub const DEFAULT_CACHE_RUN_TIME_MULTIPLIER: f64 = 20.0;
pub const DEFAULT_MAX_CACHE_TIME_SECS: f64 = 1800.0;

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_concurrent_requests_per_domain() -> usize {
    DEFAULT_CONCURRENT_REQUESTS_PER_DOMAIN
}
fn default_priority_multiplier() -> f64 {
    DEFAULT_PRIORITY_MULTIPLIER
}
fn default_balancing_temperature() -> f64 {
    DEFAULT_BALANCING_TEMPERATURE
}
fn default_max_score() -> f64 {
    DEFAULT_MAX_SCORE
}
fn default_alive_timeout_secs() -> u64 {
    DEFAULT_ALIVE_TIMEOUT_SECS
}
fn default_queue_cache_time_secs() -> f64 {
    DEFAULT_QUEUE_CACHE_TIME_SECS
}
fn default_cache_run_time_multiplier() -> f64 {
    DEFAULT_CACHE_RUN_TIME_MULTIPLIER
}
fn default_max_cache_time_secs() -> f64 {
    DEFAULT_MAX_CACHE_TIME_SECS
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "frontier", about = "Distributed crawl-frontier queue configuration")]
pub struct FrontierConfig {
    /// Redis-compatible connection string.
    #[arg(long, env = "FRONTIER_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix identifying this spider's slice of the shared store.
    #[arg(long, env = "FRONTIER_PREFIX")]
    pub prefix: String,

    /// Cap on distinct domains admitted into the queues index. Unset means
    /// unbounded.
    #[arg(long, env = "FRONTIER_MAX_DOMAINS")]
    #[serde(default)]
    pub max_domains: Option<u64>,

    /// Trigger value for domain restriction (see [`crate::admission`]).
    #[arg(long, env = "FRONTIER_MAX_RELEVANT_DOMAINS")]
    #[serde(default)]
    pub max_relevant_domains: Option<u64>,

    /// Minimum seconds between the relevant-domain cap being reached and
    /// restriction actually activating.
    #[arg(long, env = "FRONTIER_RESTRICT_DELAY", default_value_t = 0)]
    #[serde(default)]
    pub restrict_delay_secs: u64,

    /// Requests pulled per `pop_multi` call.
    #[arg(long, env = "FRONTIER_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Caps a single queue's share of a batch.
    #[arg(long, env = "FRONTIER_CONCURRENT_REQUESTS_PER_DOMAIN", default_value_t = DEFAULT_CONCURRENT_REQUESTS_PER_DOMAIN)]
    #[serde(default = "default_concurrent_requests_per_domain")]
    pub concurrent_requests_per_domain: usize,

    #[arg(long, env = "FRONTIER_PRIORITY_MULTIPLIER", default_value_t = DEFAULT_PRIORITY_MULTIPLIER)]
    #[serde(default = "default_priority_multiplier")]
    pub priority_multiplier: f64,

    #[arg(long, env = "FRONTIER_BALANCING_TEMPERATURE", default_value_t = DEFAULT_BALANCING_TEMPERATURE)]
    #[serde(default = "default_balancing_temperature")]
    pub balancing_temperature: f64,

    #[arg(long, env = "FRONTIER_MAX_SCORE", default_value_t = DEFAULT_MAX_SCORE)]
    #[serde(default = "default_max_score")]
    pub max_score: f64,

    /// Heartbeat TTL; see [`crate::worker_directory`].
    #[arg(long, env = "FRONTIER_ALIVE_TIMEOUT", default_value_t = DEFAULT_ALIVE_TIMEOUT_SECS)]
    #[serde(default = "default_alive_timeout_secs")]
    pub alive_timeout_secs: u64,

    /// Floor of the timed cache's adaptive lifetime.
    #[arg(long, env = "FRONTIER_QUEUE_CACHE_TIME", default_value_t = DEFAULT_QUEUE_CACHE_TIME_SECS)]
    #[serde(default = "default_queue_cache_time_secs")]
    pub queue_cache_time_secs: f64,

    #[arg(long, env = "FRONTIER_CACHE_RUN_TIME_MULTIPLIER", default_value_t = DEFAULT_CACHE_RUN_TIME_MULTIPLIER)]
    #[serde(default = "default_cache_run_time_multiplier")]
    pub cache_run_time_multiplier: f64,

    #[arg(long, env = "FRONTIER_MAX_CACHE_TIME", default_value_t = DEFAULT_MAX_CACHE_TIME_SECS)]
    #[serde(default = "default_max_cache_time_secs")]
    pub max_cache_time_secs: f64,

    /// Disables the timed cache entirely. Used by tests that need
    /// selection to reflect every push immediately.
    #[arg(long, env = "FRONTIER_SKIP_CACHE", default_value_t = false)]
    #[serde(default)]
    pub skip_cache: bool,

    /// Compress URLs in the codec's wire format.
    #[arg(long, env = "FRONTIER_COMPRESS_URLS", default_value_t = false)]
    #[serde(default)]
    pub compress_urls: bool,
}

impl FrontierConfig {
    /// Build a config for tests and in-process examples, bypassing
    /// `clap::Parser::parse()`'s argv/env inspection.
    pub fn for_prefix(prefix: impl Into<String>) -> Self {
        FrontierConfig {
            redis_url: default_redis_url(),
            prefix: prefix.into(),
            max_domains: None,
            max_relevant_domains: None,
            restrict_delay_secs: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrent_requests_per_domain: DEFAULT_CONCURRENT_REQUESTS_PER_DOMAIN,
            priority_multiplier: DEFAULT_PRIORITY_MULTIPLIER,
            balancing_temperature: DEFAULT_BALANCING_TEMPERATURE,
            max_score: DEFAULT_MAX_SCORE,
            alive_timeout_secs: DEFAULT_ALIVE_TIMEOUT_SECS,
            queue_cache_time_secs: DEFAULT_QUEUE_CACHE_TIME_SECS,
            cache_run_time_multiplier: DEFAULT_CACHE_RUN_TIME_MULTIPLIER,
            max_cache_time_secs: DEFAULT_MAX_CACHE_TIME_SECS,
            skip_cache: false,
            compress_urls: false,
        }
    }

    /// Parse a `FrontierConfig` out of a TOML string — e.g. a `[frontier]`
    /// table lifted from a larger crawl-engine config file. Every field
    /// except `prefix` falls back to the same default the `clap` flag
    /// would use when absent from the document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| FrontierError::Config(err.to_string()))
    }

    /// Read and parse a `FrontierConfig` from a TOML file on disk.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| FrontierError::Config(format!("{}: {}", path.display(), err)))?;
        Self::from_toml_str(&content)
    }

    /// Render this config back to TOML, e.g. to seed a crawl-engine config
    /// template from the `clap`-parsed defaults.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| FrontierError::Config(err.to_string()))
    }

    /// Softmax temperature: `balancing_temperature * priority_multiplier`.
    pub fn softmax_temperature(&self) -> f64 {
        self.balancing_temperature * self.priority_multiplier
    }

    /// Per-queue cap on a batched softmax pop:
    /// `ceil(concurrent_requests_per_domain / 2)`.
    pub fn max_queue_n(&self) -> usize {
        self.concurrent_requests_per_domain.div_ceil(2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_temperature_combines_multiplier_and_temperature() {
        let cfg = FrontierConfig::for_prefix("P");
        assert_eq!(cfg.softmax_temperature(), 0.1 * 10_000.0);
    }

    #[test]
    fn max_queue_n_rounds_up() {
        let mut cfg = FrontierConfig::for_prefix("P");
        cfg.concurrent_requests_per_domain = 10;
        assert_eq!(cfg.max_queue_n(), 5);
        cfg.concurrent_requests_per_domain = 1;
        assert_eq!(cfg.max_queue_n(), 1);
    }

    #[test]
    fn toml_round_trip_preserves_explicit_fields() {
        let cfg = FrontierConfig::for_prefix("P");
        let toml = cfg.to_toml_string().unwrap();
        let parsed = FrontierConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.prefix, "P");
        assert_eq!(parsed.batch_size, cfg.batch_size);
        assert_eq!(parsed.softmax_temperature(), cfg.softmax_temperature());
    }

    #[test]
    fn toml_missing_fields_fall_back_to_defaults() {
        let cfg = FrontierConfig::from_toml_str("prefix = \"P\"\n").unwrap();
        assert_eq!(cfg.prefix, "P");
        assert_eq!(cfg.redis_url, default_redis_url());
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.max_domains, None);
    }

    #[test]
    fn toml_missing_prefix_is_a_config_error() {
        let err = FrontierConfig::from_toml_str("batch_size = 10\n").unwrap_err();
        assert!(matches!(err, FrontierError::Config(_)));
    }
}
