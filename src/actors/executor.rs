//! Executor - Worker pool performing the HTTP checks
//!
//! Workers share one job receiver. Each job resolves its monitor, waits for a
//! permit of the concurrency limiter and performs the check. The limiter is
//! sized independently of the worker count, so it caps requests in flight
//! even when workers are plentiful.
//!
//! Every job yields exactly one [`HttpResult`]. A monitor that does not
//! exist produces a failure result instead of a check, one whose definition
//! could not be loaded is deferred, and one that is no longer active is
//! skipped without a request.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::monitors::{CheckOutcome, HttpChecker, Monitor};
use crate::service::MonitorService;

use super::messages::{Disposition, HttpResult, JobPayload};

/// State shared by all executor workers
struct Executor {
    checker: HttpChecker,
    service: Arc<dyn MonitorService>,
    limiter: Arc<Semaphore>,
}

impl Executor {
    #[instrument(skip(self), fields(monitor_id = %job.monitor_id))]
    async fn execute(&self, job: JobPayload) -> HttpResult {
        let monitor = match self.service.load_monitor(job.monitor_id).await {
            Ok(Some(monitor)) => monitor,
            Ok(None) => {
                warn!("monitor not found, reporting failure");
                return HttpResult::unresolved(job.monitor_id, "monitor not found");
            }
            Err(e) => {
                warn!("failed to load monitor, deferring check: {e}");
                return HttpResult::deferred(job.monitor_id, format!("failed to load monitor: {e}"));
            }
        };

        if !monitor.is_active() {
            debug!("monitor is {}, skipping check", monitor.status);
            return HttpResult::inactive(&monitor);
        }

        let Ok(_permit) = self.limiter.acquire().await else {
            error!("concurrency limiter closed");
            return HttpResult::deferred(job.monitor_id, "concurrency limiter closed");
        };

        let outcome = self.checker.check(&monitor).await;
        trace!("check finished: success={} latency={}ms", outcome.success, outcome.latency_ms);

        into_result(&monitor, outcome)
    }
}

fn into_result(monitor: &Monitor, outcome: CheckOutcome) -> HttpResult {
    HttpResult {
        monitor_id: monitor.id,
        success: outcome.success,
        status_code: outcome.status_code,
        latency_ms: Some(outcome.latency_ms),
        error: outcome.error,
        url: monitor.url.clone(),
        disposition: Disposition::Checked {
            interval_secs: monitor.interval_secs,
        },
        alert_email: monitor.alert_email.clone(),
        checked_at: chrono::Utc::now(),
    }
}

/// Handle for the executor worker pool
pub struct ExecutorHandle {
    closing: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ExecutorHandle {
    /// Spawn `worker_count` workers sharing `job_rx`
    pub fn spawn(
        worker_count: usize,
        max_in_flight: usize,
        checker: HttpChecker,
        service: Arc<dyn MonitorService>,
        job_rx: mpsc::Receiver<JobPayload>,
        result_tx: mpsc::Sender<HttpResult>,
    ) -> Self {
        let executor = Arc::new(Executor {
            checker,
            service,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
        });
        let job_rx = Arc::new(Mutex::new(job_rx));
        let closing = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    executor.clone(),
                    job_rx.clone(),
                    result_tx.clone(),
                    closing.clone(),
                ))
            })
            .collect();

        debug!("spawned {worker_count} executor workers (max {max_in_flight} checks in flight)");

        Self { closing, workers }
    }

    /// Close the job channel, let the workers drain it and wait for them
    pub async fn stop(self) {
        self.closing.cancel();

        for joined in join_all(self.workers).await {
            if let Err(e) = joined {
                error!("executor worker panicked: {e}");
            }
        }

        debug!("executor stopped");
    }
}

#[instrument(skip(executor, job_rx, result_tx, closing))]
async fn run_worker(
    worker: usize,
    executor: Arc<Executor>,
    job_rx: Arc<Mutex<mpsc::Receiver<JobPayload>>>,
    result_tx: mpsc::Sender<HttpResult>,
    closing: CancellationToken,
) {
    trace!("executor worker {worker} started");

    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            tokio::select! {
                biased;

                job = rx.recv() => job,

                _ = closing.cancelled() => {
                    rx.close();
                    rx.recv().await
                }
            }
        };

        let Some(job) = job else {
            break;
        };

        let result = executor.execute(job).await;

        if result_tx.send(result).await.is_err() {
            error!(monitor_id = %job.monitor_id, "result channel closed, stopping executor worker");
            break;
        }
    }

    trace!("executor worker {worker} stopped");
}
