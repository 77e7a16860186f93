//! Storage trait definitions
//!
//! Implementations must be `Send + Sync` as they are shared across the
//! worker pools of the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StorageResult;
use super::schema::{Incident, IncidentUpdate};
use crate::monitors::{CheckRecord, Monitor};

/// System of record for monitor definitions
#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// Load a monitor, `None` if it does not exist
    async fn get(&self, id: Uuid) -> StorageResult<Option<Monitor>>;

    /// Insert or replace a monitor definition
    async fn upsert(&self, monitor: &Monitor) -> StorageResult<()>;

    /// All monitors with status `active`
    async fn list_active(&self) -> StorageResult<Vec<Monitor>>;

    /// Store the outcome of the latest check
    ///
    /// Fails with `StorageError::NotFound` if the monitor does not exist.
    async fn record_check(&self, id: Uuid, record: &CheckRecord) -> StorageResult<()>;
}

/// Failure streaks per monitor
///
/// ## Invariant
///
/// At most one open incident exists per monitor. `open_or_extend` either
/// opens one (when none is open) or extends the open one.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Open a new incident or extend the open one with another failure
    async fn open_or_extend(
        &self,
        monitor_id: Uuid,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<IncidentUpdate>;

    /// Close the open incident, returning it, or `None` if none was open
    async fn close_open(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StorageResult<Option<Incident>>;

    /// The currently open incident, if any
    async fn open_incident(&self, monitor_id: Uuid) -> StorageResult<Option<Incident>>;
}
