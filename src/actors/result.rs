//! ResultProcessor - Routes check results into the success and failure lanes
//!
//! ## Message Flow
//!
//! ```text
//!                         ┌─▶ success lane (M workers) ─▶ re-arm, close incident
//! HttpResult ─▶ router ───┤
//!                         └─▶ failure lane (K workers) ─▶ re-arm, open/extend incident ─▶ AlertEvent
//! ```
//!
//! Results of inactive monitors are dropped by the router, so a paused
//! monitor is never re-armed. Deferred results (the monitor could not be
//! loaded) only re-arm after a short backoff; no incident, no alert.
//!
//! The router exits once the result channel is closed and drained. Dropping
//! its lane senders then stops both lanes, and the last lane worker to exit
//! drops the last alert sender.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::monitors::CheckRecord;
use crate::service::MonitorService;
use crate::storage::{IncidentStore, IncidentUpdate};
use crate::store::DueQueue;
use crate::util::LOAD_RETRY_SECS;

use super::messages::{AlertEvent, Disposition, HttpResult, Severity};

/// Worker counts and capacities of both lanes
#[derive(Debug, Clone, Copy)]
pub struct LaneSizes {
    pub success_workers: usize,
    pub failure_workers: usize,
    pub success_capacity: usize,
    pub failure_capacity: usize,
}

impl From<&crate::config::ResultProcessorConfig> for LaneSizes {
    fn from(config: &crate::config::ResultProcessorConfig) -> Self {
        Self {
            success_workers: config.success_workers,
            failure_workers: config.failure_workers,
            success_capacity: config.success_capacity,
            failure_capacity: config.failure_capacity,
        }
    }
}

/// Dependencies shared by the lane workers
struct Lanes {
    service: Arc<dyn MonitorService>,
    incidents: Arc<dyn IncidentStore>,
    queue: Arc<dyn DueQueue>,
}

impl Lanes {
    #[instrument(skip(self, result), fields(monitor_id = %result.monitor_id))]
    async fn handle_success(&self, result: HttpResult) {
        let id = result.monitor_id;

        if let Err(e) = self.queue.clear_incident(id).await {
            warn!("failed to clear incident marker: {e}");
        }

        if let Some(interval) = result.rearm_after() {
            self.service.schedule_monitor(id, interval, "check succeeded").await;
        }

        match self.incidents.close_open(id, result.checked_at).await {
            Ok(Some(incident)) => info!(
                "closed incident #{} after {} failures",
                incident.id, incident.failure_count
            ),
            Ok(None) => {}
            Err(e) => warn!("failed to close open incident: {e}"),
        }

        self.service.record_check(id, record_of(&result)).await;
    }

    /// Returns the alert event for the failure, `None` if no check was made
    #[instrument(skip(self, result), fields(monitor_id = %result.monitor_id))]
    async fn handle_failure(&self, result: HttpResult) -> Option<AlertEvent> {
        let id = result.monitor_id;
        let detail = result.detail();

        if result.disposition == Disposition::Deferred {
            warn!("monitor could not be loaded, retrying: {detail}");
            self.service.schedule_monitor(id, LOAD_RETRY_SECS, "load failed").await;
            return None;
        }

        debug!("check failed: {detail}");

        let update = match self.incidents.open_or_extend(id, &detail, result.checked_at).await {
            Ok(update) => Some(update),
            Err(e) => {
                warn!("failed to record incident: {e}");
                None
            }
        };

        if let Some(IncidentUpdate { incident, .. }) = &update {
            if let Err(e) = self.queue.mark_incident(id, incident.id).await {
                warn!("failed to mark incident: {e}");
            }
        }

        match result.rearm_after() {
            Some(interval) => self.service.schedule_monitor(id, interval, "check failed").await,
            None => debug!("monitor did not resolve, not re-arming"),
        }

        if let Disposition::Checked { .. } = result.disposition {
            self.service.record_check(id, record_of(&result)).await;
        }

        let (incident_id, failure_count, severity) = match &update {
            Some(IncidentUpdate { incident, opened }) => (
                Some(incident.id),
                incident.failure_count,
                if *opened {
                    Severity::Critical
                } else {
                    Severity::Warning
                },
            ),
            None => (None, 1, Severity::Critical),
        };

        Some(AlertEvent {
            monitor_id: id,
            incident_id,
            severity,
            url: result.url,
            error: detail,
            status_code: result.status_code,
            latency_ms: result.latency_ms,
            failure_count,
            recipient: result.alert_email,
            timestamp: result.checked_at,
        })
    }
}

fn record_of(result: &HttpResult) -> CheckRecord {
    CheckRecord {
        success: result.success,
        latency_ms: result.latency_ms,
        checked_at: result.checked_at,
    }
}

/// Handle for the router and both lane pools
pub struct ResultProcessor {
    router: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl ResultProcessor {
    pub fn spawn(
        sizes: LaneSizes,
        service: Arc<dyn MonitorService>,
        incidents: Arc<dyn IncidentStore>,
        queue: Arc<dyn DueQueue>,
        result_rx: mpsc::Receiver<HttpResult>,
        alert_tx: mpsc::Sender<AlertEvent>,
    ) -> Self {
        let lanes = Arc::new(Lanes {
            service,
            incidents,
            queue,
        });

        let (success_tx, success_rx) = mpsc::channel(sizes.success_capacity);
        let (failure_tx, failure_rx) = mpsc::channel(sizes.failure_capacity);
        let success_rx = Arc::new(Mutex::new(success_rx));
        let failure_rx = Arc::new(Mutex::new(failure_rx));

        let router = tokio::spawn(route(result_rx, success_tx, failure_tx));

        let mut workers = Vec::with_capacity(sizes.success_workers + sizes.failure_workers);
        for worker in 0..sizes.success_workers {
            workers.push(tokio::spawn(success_worker(worker, lanes.clone(), success_rx.clone())));
        }
        for worker in 0..sizes.failure_workers {
            workers.push(tokio::spawn(failure_worker(
                worker,
                lanes.clone(),
                failure_rx.clone(),
                alert_tx.clone(),
            )));
        }

        debug!(
            "spawned result processor with {} success and {} failure workers",
            sizes.success_workers, sizes.failure_workers
        );

        Self { router, workers }
    }

    /// Wait until the router and every lane worker have exited
    ///
    /// Returns once the result channel has been closed and fully drained.
    pub async fn workers_closing_wait(self) {
        if let Err(e) = self.router.await {
            error!("result router panicked: {e}");
        }

        for joined in join_all(self.workers).await {
            if let Err(e) = joined {
                error!("lane worker panicked: {e}");
            }
        }

        debug!("result processor stopped");
    }
}

#[instrument(skip_all)]
async fn route(
    mut result_rx: mpsc::Receiver<HttpResult>,
    success_tx: mpsc::Sender<HttpResult>,
    failure_tx: mpsc::Sender<HttpResult>,
) {
    while let Some(result) = result_rx.recv().await {
        let monitor_id = result.monitor_id;
        let lane = match result.disposition {
            Disposition::Inactive => {
                debug!(%monitor_id, "monitor is not active, dropping result");
                continue;
            }
            _ if result.success => &success_tx,
            _ => &failure_tx,
        };

        if lane.send(result).await.is_err() {
            error!(%monitor_id, "lane channel closed, stopping router");
            break;
        }
    }

    trace!("result channel drained, closing lanes");
}

async fn next<T>(rx: &Mutex<mpsc::Receiver<T>>) -> Option<T> {
    rx.lock().await.recv().await
}

async fn success_worker(worker: usize, lanes: Arc<Lanes>, rx: Arc<Mutex<mpsc::Receiver<HttpResult>>>) {
    while let Some(result) = next(&rx).await {
        lanes.handle_success(result).await;
    }

    trace!("success worker {worker} stopped");
}

async fn failure_worker(
    worker: usize,
    lanes: Arc<Lanes>,
    rx: Arc<Mutex<mpsc::Receiver<HttpResult>>>,
    alert_tx: mpsc::Sender<AlertEvent>,
) {
    while let Some(result) = next(&rx).await {
        let Some(event) = lanes.handle_failure(result).await else {
            continue;
        };
        let monitor_id = event.monitor_id;

        if alert_tx.send(event).await.is_err() {
            error!(%monitor_id, "alert channel closed, stopping failure worker");
            break;
        }
    }

    trace!("failure worker {worker} stopped");
}
