//! Scheduler - Turns due entries into jobs
//!
//! Every tick pops a batch from the due queue (ascending due order) and hands
//! each due monitor to the executor without ever blocking:
//!
//! ```text
//! entry.due <= now  → try_send(job)
//!                       Ok    → dispatched
//!                       Full  → schedule(member, now + 2s)
//!                       Closed→ schedule(member, now + 2s), abort tick
//! entry.due >  now  → reinsert this and every remaining entry, stop tick
//! bad identifier    → log and drop
//! ```
//!
//! The first future entry ends the tick because the batch is ordered, so
//! nothing after it can be due either.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

use crate::store::{DueEntry, DueQueue};
use crate::util::{BACKPRESSURE_BACKOFF_SECS, due_in, unix_now};

use super::messages::JobPayload;

/// What happened during a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries handed to the executor
    pub dispatched: usize,

    /// Entries rescheduled because the job channel was full or closed
    pub backed_off: usize,

    /// Not-yet-due entries put back with their score unchanged
    pub reinserted: usize,

    /// Entries whose identifier could not be parsed
    pub dropped: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Scheduler {
    queue: Arc<dyn DueQueue>,

    job_tx: mpsc::Sender<JobPayload>,

    tick_interval: Duration,

    batch_size: usize,

    token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn DueQueue>,
        job_tx: mpsc::Sender<JobPayload>,
        tick_interval: Duration,
        batch_size: usize,
        token: CancellationToken,
    ) -> Self {
        Self {
            queue,
            job_tx,
            tick_interval,
            batch_size,
            token,
        }
    }

    /// Spawn the tick loop, the job sender is dropped when it stops
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Tick until the lifetime token is cancelled
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn run(self) {
        debug!("starting scheduler with tick interval {:?}", self.tick_interval);

        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => {
                    debug!("lifetime token cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    let report = self.tick().await;
                    if !report.is_idle() {
                        debug!(
                            dispatched = report.dispatched,
                            backed_off = report.backed_off,
                            reinserted = report.reinserted,
                            dropped = report.dropped,
                            "tick finished"
                        );
                    }
                }
            }
        }

        debug!("scheduler stopped");
    }

    /// Run a single tick
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        let entries = match self.queue.pop_due(self.batch_size).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to pop due entries, retrying next tick: {e}");
                return report;
            }
        };

        if entries.is_empty() {
            return report;
        }

        let now = unix_now();
        trace!("popped {} entries at {now}", entries.len());

        for (index, entry) in entries.iter().enumerate() {
            if entry.due > now {
                report.reinserted = self.reinsert(&entries[index..]).await;
                break;
            }

            if self.token.is_cancelled() {
                // the entry being dispatched is lost for this cycle
                debug!(member = %entry.member, "cancelled mid-dispatch");
                report.reinserted = self.reinsert(&entries[index + 1..]).await;
                break;
            }

            let monitor_id = match Uuid::parse_str(&entry.member) {
                Ok(id) => id,
                Err(e) => {
                    warn!(member = %entry.member, "dropping due entry with invalid monitor id: {e}");
                    report.dropped += 1;
                    continue;
                }
            };

            match self.job_tx.try_send(JobPayload { monitor_id }) {
                Ok(()) => {
                    trace!(%monitor_id, "dispatched job");
                    report.dispatched += 1;
                }
                Err(TrySendError::Full(_)) => {
                    debug!(%monitor_id, "job channel full, backing off");
                    self.back_off(entry).await;
                    report.backed_off += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    error!(%monitor_id, "job channel closed, aborting tick");
                    self.back_off(entry).await;
                    report.backed_off += 1;
                    report.reinserted = self.reinsert(&entries[index + 1..]).await;
                    break;
                }
            }
        }

        report
    }

    async fn back_off(&self, entry: &DueEntry) {
        let due = due_in(BACKPRESSURE_BACKOFF_SECS);
        if let Err(e) = self.queue.schedule(&entry.member, due).await {
            error!(member = %entry.member, "failed to reschedule after backpressure: {e}");
        }
    }

    async fn reinsert(&self, entries: &[DueEntry]) -> usize {
        if entries.is_empty() {
            return 0;
        }

        match self.queue.schedule_batch(entries).await {
            Ok(()) => entries.len(),
            Err(e) => {
                error!("failed to reinsert {} not-yet-due entries: {e}", entries.len());
                0
            }
        }
    }
}
