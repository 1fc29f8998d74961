//! In-process fake [`super::StoreGateway`] backed by `std::sync::Mutex`.
//!
//! Implements the same atomicity guarantees a single-threaded Redis gives
//! (each call locks the whole store for its duration), which is sufficient
//! to exercise every invariant in spec §8 without a live server.

use super::{PushOutcome, StoreGateway};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    // sorted sets: key -> member -> score
    zsets: HashMap<String, BTreeMap<String, f64>>,
    sets: HashMap<String, HashSet<String>>,
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// An in-memory [`StoreGateway`] for tests. Key expiry (`set_ex`) is tracked
/// but never actively evicted — callers that need expiry semantics should
/// check timestamps themselves, mirroring how this crate's own
/// [`crate::worker_directory::WorkerDirectory::discover`] probes heartbeat
/// keys rather than relying on passive eviction.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        MemoryGateway::default()
    }

    fn sorted_members(zset: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
        let mut members: Vec<(String, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
        members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        members
    }
}

#[async_trait]
impl StoreGateway for MemoryGateway {
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let zset = state.zsets.entry(key.to_string()).or_default();
        Ok(zset.insert(member.to_string(), score).is_none())
    }

    async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        let state = self.state.lock().unwrap();
        let Some(zset) = state.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let members = Self::sorted_members(zset);
        Ok(slice_range(&members, start, stop))
    }

    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let Some(zset) = state.zsets.get_mut(key) else {
            return Ok(0);
        };
        let members = Self::sorted_members(zset);
        let to_remove = slice_range(&members, start, stop);
        for (m, _) in &to_remove {
            zset.remove(m);
        }
        Ok(to_remove.len() as i64)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .zsets
            .get_mut(key)
            .map(|z| z.remove(member).is_some())
            .unwrap_or(false))
    }

    async fn zcard(&self, key: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.zsets.get(key).map(|z| z.len() as i64).unwrap_or(0))
    }

    async fn zrank(&self, key: &str, member: &str) -> Result<Option<i64>> {
        let state = self.state.lock().unwrap();
        let Some(zset) = state.zsets.get(key) else {
            return Ok(None);
        };
        let members = Self::sorted_members(zset);
        Ok(members.iter().position(|(m, _)| m == member).map(|i| i as i64))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> Result<i64> {
        let state = self.state.lock().unwrap();
        Ok(state.sets.get(key).map(|s| s.len() as i64).unwrap_or(0))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .sets
            .get_mut(key)
            .map(|s| s.remove(member))
            .unwrap_or(false))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let entry = state.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn decr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let entry = state.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) - amount;
        *entry = next.to_string();
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.strings.get(key).cloned())
    }

    async fn del(&self, keys: &[String]) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let mut n = 0;
        for key in keys {
            if state.zsets.remove(key).is_some() { n += 1; }
            if state.sets.remove(key).is_some() { n += 1; }
            if state.strings.remove(key).is_some() { n += 1; }
            if state.hashes.remove(key).is_some() { n += 1; }
        }
        Ok(n)
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hget_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn push_member(
        &self,
        queue_key: &str,
        queues_index_key: &str,
        member: &str,
        score: f64,
    ) -> Result<PushOutcome> {
        let mut state = self.state.lock().unwrap();
        let zset = state.zsets.entry(queue_key.to_string()).or_default();
        let member_added = zset.insert(member.to_string(), score).is_none();
        let top_score = Self::sorted_members(zset)
            .first()
            .map(|(_, s)| *s)
            .unwrap_or(score);
        let index = state.zsets.entry(queues_index_key.to_string()).or_default();
        let queue_key_added = index.insert(queue_key.to_string(), top_score).is_none();
        Ok(PushOutcome { member_added, queue_key_added })
    }

    async fn read_and_remove_top(
        &self,
        queue_key: &str,
        n: usize,
    ) -> Result<Vec<(String, f64)>> {
        let mut state = self.state.lock().unwrap();
        let Some(zset) = state.zsets.get_mut(queue_key) else {
            return Ok(Vec::new());
        };
        let members = Self::sorted_members(zset);
        let read: Vec<(String, f64)> = members.iter().take(n + 1).cloned().collect();
        for (m, _) in members.iter().take(n) {
            zset.remove(m);
        }
        Ok(read)
    }
}

fn slice_range(members: &[(String, f64)], start: isize, stop: isize) -> Vec<(String, f64)> {
    let len = members.len() as isize;
    if len == 0 {
        return Vec::new();
    }
    let norm = |i: isize| -> isize {
        if i < 0 { (len + i).max(0) } else { i.min(len) }
    };
    let start = norm(start);
    let stop = (norm(stop) + 1).min(len);
    if start >= stop {
        return Vec::new();
    }
    members[start as usize..stop as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zadd_reports_new_members() {
        let g = MemoryGateway::new();
        assert!(g.zadd("k", "a", 1.0).await.unwrap());
        assert!(!g.zadd("k", "a", 2.0).await.unwrap());
    }

    #[tokio::test]
    async fn zrange_is_sorted_by_score() {
        let g = MemoryGateway::new();
        g.zadd("k", "b", 2.0).await.unwrap();
        g.zadd("k", "a", 1.0).await.unwrap();
        let range = g.zrange_withscores("k", 0, -1).await.unwrap();
        assert_eq!(range, vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
    }

    #[tokio::test]
    async fn read_and_remove_top_removes_only_n() {
        let g = MemoryGateway::new();
        for i in 0..5 {
            g.zadd("k", &format!("m{}", i), i as f64).await.unwrap();
        }
        let read = g.read_and_remove_top("k", 2).await.unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(g.zcard("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn push_member_upserts_queues_index_with_top_score() {
        let g = MemoryGateway::new();
        let outcome = g.push_member("q", "idx", "m1", 5.0).await.unwrap();
        assert!(outcome.member_added);
        assert!(outcome.queue_key_added);
        let top = g.zrange_withscores("idx", 0, -1).await.unwrap();
        assert_eq!(top, vec![("q".to_string(), 5.0)]);

        let outcome2 = g.push_member("q", "idx", "m2", 1.0).await.unwrap();
        assert!(outcome2.member_added);
        assert!(!outcome2.queue_key_added);
        let top = g.zrange_withscores("idx", 0, -1).await.unwrap();
        assert_eq!(top, vec![("q".to_string(), 1.0)]);
    }
}
