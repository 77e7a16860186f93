//! Redis due-queue store
//!
//! ## Keys
//!
//! - `<due_key>` (default `monitors:due`): sorted set, score = due time
//! - `monitor:{id}`: JSON snapshot, expires after [`SNAPSHOT_TTL`]
//! - `incident:{id}`: open incident marker, same expiry
//!
//! Writes go through [`retry`] so a single dropped connection does not cost
//! a whole scheduling cycle. Pops are never retried: a failed `ZPOPMIN` is
//! abandoned and the scheduler tries again on its next tick.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::backend::{DueEntry, DueQueue, SNAPSHOT_TTL, SnapshotCache};
use super::error::{StoreError, StoreResult};
use super::retry::{WRITE_ATTEMPTS, retry};
use crate::config::RedisConfig;
use crate::monitors::Monitor;

fn monitor_key(id: Uuid) -> String {
    format!("monitor:{id}")
}

fn incident_key(id: Uuid) -> String {
    format!("incident:{id}")
}

/// Redis-backed store
///
/// `ConnectionManager` reconnects transparently and is cheap to clone, so
/// every operation works on its own clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    due_key: String,
}

impl RedisStore {
    /// Connect and verify the connection with a `PING`
    ///
    /// Every command, reconnects included, is bounded by the configured
    /// response and dial timeouts, so a hung server surfaces as an error.
    #[instrument(skip_all)]
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        info!("connecting to Redis due-queue store");

        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let dial_timeout = config.dial_timeout();
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(dial_timeout)
            .set_response_timeout(config.response_timeout());

        let conn = tokio::time::timeout(
            dial_timeout,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        .map_err(|_| StoreError::Timeout(format!("no connection within {dial_timeout:?}")))?
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        let mut ping = conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut ping).await?;
        debug!("redis answered {pong}");

        Ok(Self {
            conn,
            due_key: config.due_key.clone(),
        })
    }

    pub fn due_key(&self) -> &str {
        &self.due_key
    }
}

#[async_trait]
impl DueQueue for RedisStore {
    #[instrument(skip(self))]
    async fn pop_due(&self, limit: usize) -> StoreResult<Vec<DueEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let popped: Vec<(String, f64)> = conn.zpopmin(&self.due_key, limit as isize).await?;

        Ok(popped
            .into_iter()
            .map(|(member, score)| DueEntry::new(member, score as i64))
            .collect())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn schedule_batch(&self, entries: &[DueEntry]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let items: Vec<(i64, String)> = entries
            .iter()
            .map(|entry| (entry.due, entry.member.clone()))
            .collect();

        retry(WRITE_ATTEMPTS, || {
            let mut conn = self.conn.clone();
            let key = self.due_key.clone();
            let items = items.clone();
            async move {
                let _: () = conn.zadd_multiple(key, &items).await?;
                Ok(())
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn schedule(&self, member: &str, due: i64) -> StoreResult<()> {
        retry(WRITE_ATTEMPTS, || {
            let mut conn = self.conn.clone();
            let key = self.due_key.clone();
            let member = member.to_string();
            async move {
                let _: () = conn.zadd(key, member, due).await?;
                Ok(())
            }
        })
        .await
    }

    #[instrument(skip(self))]
    async fn unschedule(&self, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(&self.due_key, member).await?;
        Ok(())
    }

    async fn mark_incident(&self, monitor_id: Uuid, incident_id: i64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(incident_key(monitor_id), incident_id, SNAPSHOT_TTL.as_secs())
            .await?;
        Ok(())
    }

    async fn clear_incident(&self, monitor_id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(incident_key(monitor_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for RedisStore {
    async fn set_monitor(&self, monitor: &Monitor) -> StoreResult<()> {
        let json = serde_json::to_string(monitor)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(monitor_key(monitor.id), json, SNAPSHOT_TTL.as_secs())
            .await?;
        Ok(())
    }

    async fn get_monitor(&self, id: Uuid) -> Option<Monitor> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = match conn.get(monitor_key(id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(monitor_id = %id, "failed to read monitor snapshot: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!(monitor_id = %id, "discarding undecodable monitor snapshot: {e}");
                None
            }
        }
    }

    async fn del_monitor(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(monitor_key(id)).await?;
        Ok(())
    }
}
