//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Runs where monitors are registered at startup and history is not needed
//!
//! All data is lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::backend::{IncidentStore, MonitorRepository};
use super::error::{StorageError, StorageResult};
use super::schema::{Incident, IncidentUpdate};
use crate::monitors::{CheckRecord, Monitor};

#[derive(Debug, Default)]
struct IncidentTable {
    rows: Vec<Incident>,
    next_id: i64,
}

impl IncidentTable {
    fn open_for(&mut self, monitor_id: Uuid) -> Option<&mut Incident> {
        self.rows
            .iter_mut()
            .find(|incident| incident.monitor_id == monitor_id && incident.is_open())
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    monitors: RwLock<HashMap<Uuid, Monitor>>,
    incidents: RwLock<IncidentTable>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every incident ever recorded for a monitor, oldest first
    pub async fn incidents_for(&self, monitor_id: Uuid) -> Vec<Incident> {
        self.incidents
            .read()
            .await
            .rows
            .iter()
            .filter(|incident| incident.monitor_id == monitor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MonitorRepository for MemoryBackend {
    async fn get(&self, id: Uuid) -> StorageResult<Option<Monitor>> {
        Ok(self.monitors.read().await.get(&id).cloned())
    }

    async fn upsert(&self, monitor: &Monitor) -> StorageResult<()> {
        self.monitors.write().await.insert(monitor.id, monitor.clone());
        Ok(())
    }

    async fn list_active(&self) -> StorageResult<Vec<Monitor>> {
        Ok(self
            .monitors
            .read()
            .await
            .values()
            .filter(|monitor| monitor.is_active())
            .cloned()
            .collect())
    }

    async fn record_check(&self, id: Uuid, record: &CheckRecord) -> StorageResult<()> {
        let mut monitors = self.monitors.write().await;
        let monitor = monitors
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {id}")))?;
        monitor.apply_check(record);
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MemoryBackend {
    async fn open_or_extend(
        &self,
        monitor_id: Uuid,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<IncidentUpdate> {
        let mut table = self.incidents.write().await;

        if let Some(incident) = table.open_for(monitor_id) {
            incident.failure_count += 1;
            incident.last_failure_at = at;
            incident.last_error = detail.to_string();
            return Ok(IncidentUpdate {
                incident: incident.clone(),
                opened: false,
            });
        }

        table.next_id += 1;
        let incident = Incident {
            id: table.next_id,
            monitor_id,
            opened_at: at,
            last_failure_at: at,
            failure_count: 1,
            last_error: detail.to_string(),
            closed_at: None,
        };
        debug!(%monitor_id, "opened incident #{}", incident.id);
        table.rows.push(incident.clone());

        Ok(IncidentUpdate {
            incident,
            opened: true,
        })
    }

    async fn close_open(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StorageResult<Option<Incident>> {
        let mut table = self.incidents.write().await;

        Ok(table.open_for(monitor_id).map(|incident| {
            incident.closed_at = Some(at);
            incident.clone()
        }))
    }

    async fn open_incident(&self, monitor_id: Uuid) -> StorageResult<Option<Incident>> {
        Ok(self
            .incidents
            .read()
            .await
            .rows
            .iter()
            .find(|incident| incident.monitor_id == monitor_id && incident.is_open())
            .cloned())
    }
}
