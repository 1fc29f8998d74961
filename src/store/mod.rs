//! Store Gateway: the only surface that may block on network I/O.
//!
//! Every other component in this crate treats calls through [`StoreGateway`]
//! as opaque. Two implementations ship here: [`redis_gateway::RedisGateway`]
//! for production use against any Redis-compatible server, and
//! [`memory::MemoryGateway`], an in-process fake used by this crate's own
//! tests (and available to integration tests in downstream crates) so the
//! Queue Core / Selector / Admission Controller logic can be exercised
//! without a live server — the same role `tests/mock_coordinator.rs` plays
//! for this codebase's HTTP-facing coordination logic.

mod memory;
mod redis_gateway;

pub use memory::MemoryGateway;
pub use redis_gateway::RedisGateway;

use crate::error::Result;
use async_trait::async_trait;

/// Outcome of the atomic push round trip described in spec §4.5 step 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// The encoded member was not already present in the per-domain queue.
    pub member_added: bool,
    /// `queue_key` was not already present in the queues index.
    pub queue_key_added: bool,
}

/// Atomic primitives a Redis-compatible store must provide, plus two
/// composite operations (`push_member`, `pop_from_queue`) that bundle the
/// multi-command pipelines the Queue Core needs into single round trips.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    // ── sorted set ──────────────────────────────────────────────
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool>;
    async fn zrange_withscores(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<(String, f64)>>;
    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<i64>;
    async fn zrem(&self, key: &str, member: &str) -> Result<bool>;
    async fn zcard(&self, key: &str) -> Result<i64>;
    async fn zrank(&self, key: &str, member: &str) -> Result<Option<i64>>;

    // ── set ─────────────────────────────────────────────────────
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn scard(&self, key: &str) -> Result<i64>;
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;

    // ── counters & keys ─────────────────────────────────────────
    async fn incr(&self, key: &str) -> Result<i64>;
    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, keys: &[String]) -> Result<i64>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    // ── hash (credentials side-table) ──────────────────────────
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
    async fn hget_all(&self, key: &str) -> Result<Vec<(String, String)>>;

    // ── composite, atomic operations ───────────────────────────

    /// Add `member` (score `score`) to `queue_key`, then upsert `queue_key`
    /// into `queues_index_key` with the queue's new top (lowest) score — all
    /// in one atomic round trip (spec §4.5 step 5).
    async fn push_member(
        &self,
        queue_key: &str,
        queues_index_key: &str,
        member: &str,
        score: f64,
    ) -> Result<PushOutcome>;

    /// Read the top `n+1` members (with scores) of `queue_key` and remove
    /// the top `n` by rank, atomically. The caller (Queue Core) is
    /// responsible for the follow-up queues-index update (new top score, or
    /// removal), since that decision depends on how many members were read
    /// back (spec §4.5 `pop_from_queue`).
    async fn read_and_remove_top(
        &self,
        queue_key: &str,
        n: usize,
    ) -> Result<Vec<(String, f64)>>;
}
