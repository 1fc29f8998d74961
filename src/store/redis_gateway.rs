//! Production [`StoreGateway`] backed by a live Redis-compatible server.
//!
//! Simple primitives go straight through [`redis::AsyncCommands`] on a
//! [`redis::aio::ConnectionManager`] (auto-reconnecting, cheap to clone across
//! tasks — the same connection type this codebase's `/readyz` probe uses).
//! The two composite operations need a value read mid-transaction (the
//! queue's new top score) to decide what to write next, which plain
//! `MULTI`/`EXEC` pipelining cannot express — Redis fixes a transaction's
//! arguments before it starts executing. Both are implemented as small Lua
//! scripts instead, which Redis runs atomically start to finish.

use super::{PushOutcome, StoreGateway};
use crate::error::{FrontierError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

/// `ZADD` the member, then `ZADD` the queues index with the queue's new top
/// (lowest) score. Returns `{member_added, top_score, queue_key_added}`.
const PUSH_MEMBER_SCRIPT: &str = r#"
local queue_key = KEYS[1]
local queues_index_key = KEYS[2]
local member = ARGV[1]
local score = tonumber(ARGV[2])

local member_added = redis.call('ZADD', queue_key, score, member)
local top = redis.call('ZRANGE', queue_key, 0, 0, 'WITHSCORES')
local top_score = tonumber(top[2])
local queue_key_added = redis.call('ZADD', queues_index_key, top_score, queue_key)

return {member_added, top_score, queue_key_added}
"#;

/// Read the top `n+1` members (with scores) of `queue_key` and remove the
/// top `n` by rank. Returns a flat `[member, score, member, score, ...]`
/// array (Redis has no native tuple reply type).
const READ_AND_REMOVE_TOP_SCRIPT: &str = r#"
local queue_key = KEYS[1]
local n = tonumber(ARGV[1])

local members = redis.call('ZRANGE', queue_key, 0, n, 'WITHSCORES')
if n > 0 then
  redis.call('ZREMRANGEBYRANK', queue_key, 0, n - 1)
end
return members
"#;

pub struct RedisGateway {
    conn: ConnectionManager,
}

impl RedisGateway {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(RedisGateway { conn })
    }

    /// Wrap an already-established connection manager (e.g. one shared with
    /// a health-check endpoint).
    pub fn from_connection(conn: ConnectionManager) -> Self {
        RedisGateway { conn }
    }
}

fn pairs_from_flat(flat: Vec<String>) -> Vec<(String, f64)> {
    flat.chunks(2)
        .filter_map(|chunk| {
            let member = chunk.first()?.clone();
            let score: f64 = chunk.get(1)?.parse().ok()?;
            Some((member, score))
        })
        .collect()
}

#[async_trait]
impl StoreGateway for RedisGateway {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.zadd(key, member, score).await?;
        Ok(added > 0)
    }

    async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let flat: Vec<String> = conn.zrange_withscores(key, start, stop).await?;
        Ok(pairs_from_flat(flat))
    }

    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.zremrangebyrank(key, start, stop).await?)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn zcard(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn zrank(&self, key: &str, member: &str) -> Result<Option<i64>> {
        let mut conn = self.conn.clone();
        Ok(conn.zrank(key, member).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn scard(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, 1).await?)
    }

    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.decr(key, amount).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn del(&self, keys: &[String]) -> Result<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.del(keys).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let flat: Vec<String> = conn.hgetall(key).await?;
        Ok(flat
            .chunks(2)
            .filter_map(|c| Some((c.first()?.clone(), c.get(1)?.clone())))
            .collect())
    }

    async fn push_member(
        &self,
        queue_key: &str,
        queues_index_key: &str,
        member: &str,
        score: f64,
    ) -> Result<PushOutcome> {
        let mut conn = self.conn.clone();
        let (member_added, _top_score, queue_key_added): (i64, f64, i64) =
            Script::new(PUSH_MEMBER_SCRIPT)
                .key(queue_key)
                .key(queues_index_key)
                .arg(member)
                .arg(score)
                .invoke_async(&mut conn)
                .await?;
        Ok(PushOutcome {
            member_added: member_added > 0,
            queue_key_added: queue_key_added > 0,
        })
    }

    async fn read_and_remove_top(
        &self,
        queue_key: &str,
        n: usize,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let flat: Vec<String> = Script::new(READ_AND_REMOVE_TOP_SCRIPT)
            .key(queue_key)
            .arg(n)
            .invoke_async(&mut conn)
            .await
            .map_err(FrontierError::from)?;
        Ok(pairs_from_flat(flat))
    }
}
