//! # frontier — distributed crawl-frontier queue and scheduler
//!
//! A shared, per-domain priority request queue coordinated by many worker
//! processes through a single-threaded Redis-compatible store. This crate
//! owns the hard part of a distributed crawler: the queue and its
//! scheduler. It does not crawl, score, or parse anything itself — those
//! are external collaborators (deliberately out of scope here).
//!
//! ## Module organization
//!
//! Leaves first, matching how each depends only on the ones below it:
//!
//! - [`codec`] — compact encoding/decoding of a [`request::Request`] into a
//!   sorted-set member, plus URL compression.
//! - [`domain`] — registered-domain (eTLD+1) extraction and queue-key
//!   derivation.
//! - [`store`] — the [`store::StoreGateway`] trait, a production
//!   [`store::RedisGateway`], and an in-memory [`store::MemoryGateway`] fake
//!   for tests.
//! - [`worker_directory`] — liveness registration, heartbeat, and discovery
//!   of the live worker set with stable index assignment.
//! - [`partitioner`] — deterministic CRC32 mapping from a queue key to the
//!   worker that owns it.
//! - [`cache`] — a self-tuning memoizer (adaptive TTL) used to keep
//!   selection's fan-out work off the hot path.
//! - [`admission`] — max-domains cap and max-relevant-domains restriction.
//! - [`selector`] — candidate-subset computation, free-slot filtering, and
//!   uniform/softmax sampling (single and batched).
//! - [`sidetables`] — hint-URL and login-credential side-tables.
//! - [`queue`] — the [`queue::Queue`] that wires all of the above into
//!   `push`/`pop`/`pop_multi`/`stats`.
//! - [`metrics`] — Prometheus-format counters and gauges.
//! - [`config`] — [`config::FrontierConfig`], loaded from CLI flags or
//!   environment variables.
//! - [`error`] — the crate's [`error::FrontierError`] and [`error::Result`].

pub mod admission;
pub mod cache;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod partitioner;
pub mod queue;
pub mod request;
pub mod selector;
pub mod sidetables;
pub mod store;
pub mod worker_directory;

pub use config::FrontierConfig;
pub use error::{FrontierError, Result};
pub use queue::Queue;
pub use request::Request;

/// Initialize `tracing` the way this crate's binaries want logs to look:
/// human-readable to stderr by default, switchable to JSON via
/// `LOG_FORMAT=json` for log-aggregator consumption.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
