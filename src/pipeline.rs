//! Wiring of the pipeline stages
//!
//! [`Pipeline::start`] creates the channels, spawns every stage and returns a
//! handle whose [`Pipeline::shutdown`] stops the stages in dependency order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::actors::alert::AlertService;
use crate::actors::executor::ExecutorHandle;
use crate::actors::result::{LaneSizes, ResultProcessor};
use crate::actors::scheduler::Scheduler;
use crate::alerts::Notifier;
use crate::config::Config;
use crate::monitors::HttpChecker;
use crate::service::MonitorService;
use crate::storage::IncidentStore;
use crate::store::DueQueue;

/// Everything the stages talk to outside of their own channels
#[derive(Clone)]
pub struct Dependencies {
    pub queue: Arc<dyn DueQueue>,
    pub service: Arc<dyn MonitorService>,
    pub incidents: Arc<dyn IncidentStore>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct Pipeline {
    token: CancellationToken,
    scheduler: JoinHandle<()>,
    executor: ExecutorHandle,
    results: ResultProcessor,
    alerts: AlertService,
}

impl Pipeline {
    pub fn start(config: &Config, deps: Dependencies) -> anyhow::Result<Self> {
        config.validate()?;

        let token = CancellationToken::new();
        let (job_tx, job_rx) = mpsc::channel(config.channels.job_capacity);
        let (result_tx, result_rx) = mpsc::channel(config.channels.result_capacity);
        let (alert_tx, alert_rx) = mpsc::channel(config.channels.alert_capacity);

        // spawned back to front so every consumer exists before its producer
        let alerts = AlertService::spawn(
            config.alert.worker_count,
            deps.notifier,
            config.alert.owner_email.clone(),
            alert_rx,
        );

        let results = ResultProcessor::spawn(
            LaneSizes::from(&config.result_processor),
            deps.service.clone(),
            deps.incidents,
            deps.queue.clone(),
            result_rx,
            alert_tx,
        );

        let executor = ExecutorHandle::spawn(
            config.executor.worker_count,
            config.executor.max_in_flight,
            HttpChecker::new(config.executor.http_timeout())?,
            deps.service,
            job_rx,
            result_tx,
        );

        let scheduler = Scheduler::new(
            deps.queue,
            job_tx,
            config.scheduler.interval(),
            config.scheduler.batch_size,
            token.clone(),
        )
        .spawn();

        info!("pipeline started");

        Ok(Self {
            token,
            scheduler,
            executor,
            results,
            alerts,
        })
    }

    /// Lifetime token of the scheduler
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop every stage, letting in-flight work finish
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("shutting down pipeline");

        self.token.cancel();
        if let Err(e) = self.scheduler.await {
            error!("scheduler panicked: {e}");
        }

        self.executor.stop().await;
        self.results.workers_closing_wait().await;
        self.alerts.worker_closing_wait().await;

        info!("pipeline stopped");
    }
}
