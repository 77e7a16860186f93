//! Monitor service
//!
//! The narrow view of monitors the pipeline needs: resolve a monitor, re-arm
//! its next check and record check outcomes. [`CachedMonitorService`] reads
//! through the snapshot cache and falls back to the repository, repopulating
//! the cache on a miss.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::monitors::{CheckRecord, Monitor};
use crate::storage::{MonitorRepository, StorageResult};
use crate::store::{DueQueue, SnapshotCache};
use crate::util::{due_in, unix_now};

#[async_trait]
pub trait MonitorService: Send + Sync {
    /// Resolve a monitor, `Ok(None)` if it does not exist
    async fn load_monitor(&self, id: Uuid) -> StorageResult<Option<Monitor>>;

    /// Arm the next check of `id` at now + `interval_secs`
    ///
    /// Errors are logged together with `reason`; the caller has nothing
    /// better to do with them.
    async fn schedule_monitor(&self, id: Uuid, interval_secs: u32, reason: &str);

    /// Write the outcome of a check back onto the monitor
    async fn record_check(&self, id: Uuid, record: CheckRecord);
}

/// Monitor service backed by the snapshot cache, the due queue and the
/// relational repository
pub struct CachedMonitorService {
    repository: Arc<dyn MonitorRepository>,
    cache: Arc<dyn SnapshotCache>,
    queue: Arc<dyn DueQueue>,
}

impl CachedMonitorService {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        cache: Arc<dyn SnapshotCache>,
        queue: Arc<dyn DueQueue>,
    ) -> Self {
        Self {
            repository,
            cache,
            queue,
        }
    }

    /// Persist a monitor, cache it and arm its first check immediately
    #[instrument(skip(self, monitor), fields(monitor_id = %monitor.id))]
    pub async fn register(&self, monitor: &Monitor) -> anyhow::Result<()> {
        self.repository.upsert(monitor).await?;
        self.cache.set_monitor(monitor).await?;

        if monitor.is_active() {
            self.queue.schedule(&monitor.id.to_string(), unix_now()).await?;
        } else {
            self.queue.unschedule(&monitor.id.to_string()).await?;
        }

        debug!("registered monitor for {}", monitor.url);
        Ok(())
    }

    /// Arm every active monitor of the repository and warm the cache
    ///
    /// Overwriting keeps a single due entry per monitor, so calling this on
    /// every start is safe.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> anyhow::Result<usize> {
        let monitors = self.repository.list_active().await?;
        let now = unix_now();

        for monitor in &monitors {
            if let Err(e) = self.cache.set_monitor(monitor).await {
                warn!(monitor_id = %monitor.id, "failed to warm snapshot cache: {e}");
            }
            self.queue.schedule(&monitor.id.to_string(), now).await?;
        }

        info!("armed {} active monitors", monitors.len());
        Ok(monitors.len())
    }
}

#[async_trait]
impl MonitorService for CachedMonitorService {
    async fn load_monitor(&self, id: Uuid) -> StorageResult<Option<Monitor>> {
        if let Some(monitor) = self.cache.get_monitor(id).await {
            return Ok(Some(monitor));
        }

        debug!(monitor_id = %id, "snapshot cache miss, loading from repository");
        let monitor = self.repository.get(id).await?;

        if let Some(monitor) = &monitor {
            if let Err(e) = self.cache.set_monitor(monitor).await {
                warn!(monitor_id = %id, "failed to cache monitor snapshot: {e}");
            }
        }

        Ok(monitor)
    }

    async fn schedule_monitor(&self, id: Uuid, interval_secs: u32, reason: &str) {
        let due = due_in(interval_secs as i64);

        match self.queue.schedule(&id.to_string(), due).await {
            Ok(()) => debug!(monitor_id = %id, "scheduled next check at {due} ({reason})"),
            Err(e) => error!(monitor_id = %id, "failed to schedule next check ({reason}): {e}"),
        }
    }

    async fn record_check(&self, id: Uuid, record: CheckRecord) {
        if let Err(e) = self.repository.record_check(id, &record).await {
            warn!(monitor_id = %id, "failed to record check outcome: {e}");
        }

        if let Some(mut monitor) = self.cache.get_monitor(id).await {
            monitor.apply_check(&record);
            if let Err(e) = self.cache.set_monitor(&monitor).await {
                warn!(monitor_id = %id, "failed to refresh monitor snapshot: {e}");
            }
        }
    }
}
