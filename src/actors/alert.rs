//! AlertService - Delivers alert events
//!
//! A pool of workers reads [`AlertEvent`]s until the alert channel closes and
//! hands each one to the configured [`Notifier`]. Delivery failures are
//! logged and the event is dropped; there is no retry.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use crate::alerts::Notifier;

use super::messages::AlertEvent;

/// Handle for the alert worker pool
pub struct AlertService {
    workers: Vec<JoinHandle<()>>,
}

impl AlertService {
    /// Spawn `worker_count` workers sharing `alert_rx`
    ///
    /// Events without their own recipient are addressed to `owner_email`.
    pub fn spawn(
        worker_count: usize,
        notifier: Arc<dyn Notifier>,
        owner_email: String,
        alert_rx: mpsc::Receiver<AlertEvent>,
    ) -> Self {
        let alert_rx = Arc::new(Mutex::new(alert_rx));
        let owner_email: Arc<str> = owner_email.into();

        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    notifier.clone(),
                    owner_email.clone(),
                    alert_rx.clone(),
                ))
            })
            .collect();

        debug!("spawned {worker_count} alert workers using {}", notifier.name());

        Self { workers }
    }

    /// Wait until every worker has exited
    ///
    /// Workers exit once the alert channel is closed and drained.
    pub async fn worker_closing_wait(self) {
        for joined in join_all(self.workers).await {
            if let Err(e) = joined {
                error!("alert worker panicked: {e}");
            }
        }

        debug!("alert service stopped");
    }
}

#[instrument(skip(notifier, owner_email, alert_rx))]
async fn run_worker(
    worker: usize,
    notifier: Arc<dyn Notifier>,
    owner_email: Arc<str>,
    alert_rx: Arc<Mutex<mpsc::Receiver<AlertEvent>>>,
) {
    loop {
        let event = alert_rx.lock().await.recv().await;
        let Some(event) = event else {
            break;
        };

        let recipient = event.recipient.as_deref().unwrap_or(&owner_email);

        if let Err(e) = notifier.notify(&event, recipient).await {
            error!(
                monitor_id = %event.monitor_id,
                notifier = notifier.name(),
                "failed to deliver alert: {e:#}"
            );
        }
    }

    trace!("alert worker {worker} stopped");
}
