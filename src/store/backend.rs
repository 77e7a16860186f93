//! Store traits
//!
//! The pipeline only ever sees these two traits, never a concrete client.
//! Each operation is atomic at the store level, so callers need no extra
//! locking.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::error::StoreResult;
use crate::monitors::Monitor;

/// How long a cached monitor snapshot lives
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One entry of the due queue
///
/// The member is kept as the raw string stored in the queue; parsing it into
/// a monitor identifier is the scheduler's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEntry {
    pub member: String,

    /// Unix timestamp (seconds) at which the monitor is due
    pub due: i64,
}

impl DueEntry {
    pub fn new(member: impl Into<String>, due: i64) -> Self {
        Self {
            member: member.into(),
            due,
        }
    }
}

/// Sorted due-time queue
#[async_trait]
pub trait DueQueue: Send + Sync {
    /// Remove and return up to `limit` entries with the lowest due time
    ///
    /// Entries are ordered ascending by due time, ties broken by member
    /// ordering. Entries that are not due yet are returned as well; the
    /// caller is responsible for putting them back.
    async fn pop_due(&self, limit: usize) -> StoreResult<Vec<DueEntry>>;

    /// Upsert many entries at once
    async fn schedule_batch(&self, entries: &[DueEntry]) -> StoreResult<()>;

    /// Upsert a single entry, overwriting any existing due time for `member`
    async fn schedule(&self, member: &str, due: i64) -> StoreResult<()>;

    /// Remove the entry for `member` if present
    async fn unschedule(&self, member: &str) -> StoreResult<()>;

    /// Remember the open incident of a monitor
    async fn mark_incident(&self, monitor_id: Uuid, incident_id: i64) -> StoreResult<()>;

    /// Drop cached incident state of a monitor (used on recovery)
    async fn clear_incident(&self, monitor_id: Uuid) -> StoreResult<()>;
}

/// Time-bounded cache of monitor definitions
///
/// There is no read-through: a miss means "fetch from the system of record"
/// and the caller repopulates the cache itself.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn set_monitor(&self, monitor: &Monitor) -> StoreResult<()>;

    /// `None` on a miss and on undecodable snapshots
    async fn get_monitor(&self, id: Uuid) -> Option<Monitor>;

    async fn del_monitor(&self, id: Uuid) -> StoreResult<()>;
}
