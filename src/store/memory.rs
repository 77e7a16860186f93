//! In-memory due-queue store (no persistence)
//!
//! Mirrors the Redis sorted-set semantics: entries are ordered by
//! (due, member), and each member has exactly one score. Useful for:
//! - Testing without a Redis server
//! - Single-node runs where losing the schedule on restart is acceptable

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;
use uuid::Uuid;

use super::backend::{DueEntry, DueQueue, SNAPSHOT_TTL, SnapshotCache};
use super::error::StoreResult;
use crate::monitors::Monitor;

#[derive(Debug, Default)]
struct SortedSet {
    ordered: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl SortedSet {
    fn upsert(&mut self, member: &str, due: i64) {
        if let Some(previous) = self.scores.insert(member.to_string(), due) {
            self.ordered.remove(&(previous, member.to_string()));
        }
        self.ordered.insert((due, member.to_string()));
    }

    fn remove(&mut self, member: &str) {
        if let Some(previous) = self.scores.remove(member) {
            self.ordered.remove(&(previous, member.to_string()));
        }
    }

    fn pop_min(&mut self) -> Option<(i64, String)> {
        let first = self.ordered.pop_first()?;
        self.scores.remove(&first.1);
        Some(first)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    due: Mutex<SortedSet>,
    snapshots: Mutex<HashMap<Uuid, (Monitor, Instant)>>,
    incidents: Mutex<HashMap<Uuid, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Due time of `member`, if it has an entry
    pub async fn due_of(&self, member: &str) -> Option<i64> {
        self.due.lock().await.scores.get(member).copied()
    }

    /// All entries in queue order
    pub async fn entries(&self) -> Vec<DueEntry> {
        self.due
            .lock()
            .await
            .ordered
            .iter()
            .map(|(due, member)| DueEntry::new(member.clone(), *due))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.due.lock().await.scores.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Incident currently marked for a monitor
    pub async fn incident_marker(&self, monitor_id: Uuid) -> Option<i64> {
        self.incidents.lock().await.get(&monitor_id).copied()
    }
}

#[async_trait]
impl DueQueue for MemoryStore {
    async fn pop_due(&self, limit: usize) -> StoreResult<Vec<DueEntry>> {
        let mut due = self.due.lock().await;

        let mut batch = Vec::with_capacity(limit.min(due.scores.len()));
        while batch.len() < limit {
            let Some((score, member)) = due.pop_min() else {
                break;
            };
            batch.push(DueEntry::new(member, score));
        }

        trace!("popped {} entries from in-memory queue", batch.len());
        Ok(batch)
    }

    async fn schedule_batch(&self, entries: &[DueEntry]) -> StoreResult<()> {
        let mut due = self.due.lock().await;
        for entry in entries {
            due.upsert(&entry.member, entry.due);
        }
        Ok(())
    }

    async fn schedule(&self, member: &str, due: i64) -> StoreResult<()> {
        self.due.lock().await.upsert(member, due);
        Ok(())
    }

    async fn unschedule(&self, member: &str) -> StoreResult<()> {
        self.due.lock().await.remove(member);
        Ok(())
    }

    async fn mark_incident(&self, monitor_id: Uuid, incident_id: i64) -> StoreResult<()> {
        self.incidents.lock().await.insert(monitor_id, incident_id);
        Ok(())
    }

    async fn clear_incident(&self, monitor_id: Uuid) -> StoreResult<()> {
        self.incidents.lock().await.remove(&monitor_id);
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for MemoryStore {
    async fn set_monitor(&self, monitor: &Monitor) -> StoreResult<()> {
        self.snapshots
            .lock()
            .await
            .insert(monitor.id, (monitor.clone(), Instant::now() + SNAPSHOT_TTL));
        Ok(())
    }

    async fn get_monitor(&self, id: Uuid) -> Option<Monitor> {
        let mut snapshots = self.snapshots.lock().await;

        match snapshots.get(&id) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                snapshots.remove(&id);
                None
            }
            Some((monitor, _)) => Some(monitor.clone()),
            None => None,
        }
    }

    async fn del_monitor(&self, id: Uuid) -> StoreResult<()> {
        self.snapshots.lock().await.remove(&id);
        Ok(())
    }
}
