//! Liveness registration, heartbeat, and discovery of live workers with a
//! stable index assignment — the input the [`crate::partitioner`] needs to
//! decide which domains this worker owns.

use crate::error::Result;
use crate::store::StoreGateway;
use std::sync::Arc;
use tracing::warn;

/// Default heartbeat TTL: long enough to tolerate a GC pause or a slow
/// selection call without the worker being evicted mid-crawl.
pub const DEFAULT_ALIVE_TIMEOUT_SECS: u64 = 120;

pub struct WorkerDirectory {
    store: Arc<dyn StoreGateway>,
    prefix: String,
    alive_timeout_secs: u64,
    worker_id: u64,
}

impl WorkerDirectory {
    /// Register a new worker instance: acquire a fresh id from the
    /// monotonic counter, then publish it to the worker set with an initial
    /// heartbeat.
    pub async fn register(
        store: Arc<dyn StoreGateway>,
        prefix: impl Into<String>,
        alive_timeout_secs: u64,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let worker_id = store.incr(&format!("{}:worker-id", prefix)).await? as u64;
        let directory = WorkerDirectory {
            store,
            prefix,
            alive_timeout_secs,
            worker_id,
        };
        directory.heartbeat().await?;
        Ok(directory)
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    fn workers_key(&self) -> String {
        format!("{}:workers", self.prefix)
    }

    fn worker_heartbeat_key(&self, worker_id: u64) -> String {
        format!("{}:worker-{}", self.prefix, worker_id)
    }

    /// Re-publish this worker's heartbeat with a fresh TTL. Called at the
    /// start of every selection, and once at registration time.
    pub async fn heartbeat(&self) -> Result<()> {
        self.store
            .sadd(&self.workers_key(), &self.worker_id.to_string())
            .await?;
        self.store
            .set_ex(
                &self.worker_heartbeat_key(self.worker_id),
                "ok",
                self.alive_timeout_secs,
            )
            .await?;
        Ok(())
    }

    /// Return `(my_index, n_workers)`. Evicts any worker id whose heartbeat
    /// key has expired, then assigns indices by sorted id order so every
    /// worker agrees on the same partitioning for a given live set.
    pub async fn discover(&self) -> Result<(u32, u32)> {
        self.heartbeat().await?;

        let mut ids: Vec<u64> = self
            .store
            .smembers(&self.workers_key())
            .await?
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        for id in ids.clone() {
            if self.store.get(&self.worker_heartbeat_key(id)).await?.is_none() {
                self.store.srem(&self.workers_key(), &id.to_string()).await?;
                ids.retain(|&x| x != id);
            }
        }

        ids.sort_unstable();
        match ids.iter().position(|&id| id == self.worker_id) {
            Some(pos) => Ok((pos as u32, ids.len() as u32)),
            None => {
                warn!(worker_id = self.worker_id, "no live workers: selecting self");
                Ok((0, 1))
            }
        }
    }
}
