//! Dispatch scenarios of a single scheduler tick

use std::sync::Arc;
use std::time::Duration;

use heartbeat::actors::messages::JobPayload;
use heartbeat::actors::scheduler::{Scheduler, TickReport};
use heartbeat::store::{DueQueue, MemoryStore};
use heartbeat::util::{BACKPRESSURE_BACKOFF_SECS, unix_now};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn scheduler(store: &Arc<MemoryStore>, job_tx: mpsc::Sender<JobPayload>, batch_size: usize) -> Scheduler {
    Scheduler::new(
        store.clone(),
        job_tx,
        Duration::from_millis(10),
        batch_size,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_batch_of_two_dispatches_a_then_b_and_keeps_c() {
    let store = Arc::new(MemoryStore::new());
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let now = unix_now();
    store.schedule(&c.to_string(), now + 30).await.unwrap();
    store.schedule(&a.to_string(), now - 5).await.unwrap();
    store.schedule(&b.to_string(), now - 2).await.unwrap();

    let (job_tx, mut job_rx) = mpsc::channel(10);
    let report = scheduler(&store, job_tx, 2).tick().await;

    assert_eq!(report.dispatched, 2);
    assert_eq!(job_rx.recv().await.unwrap().monitor_id, a);
    assert_eq!(job_rx.recv().await.unwrap().monitor_id, b);
    assert_eq!(store.len().await, 1);
    assert_eq!(store.due_of(&c.to_string()).await, Some(now + 30));
}

#[tokio::test]
async fn test_future_entry_in_batch_is_reinserted_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let now = unix_now();
    store.schedule(&a.to_string(), now - 5).await.unwrap();
    store.schedule(&b.to_string(), now - 2).await.unwrap();
    store.schedule(&c.to_string(), now + 30).await.unwrap();

    let (job_tx, mut job_rx) = mpsc::channel(10);
    let report = scheduler(&store, job_tx, 3).tick().await;

    assert_eq!(
        report,
        TickReport {
            dispatched: 2,
            reinserted: 1,
            ..TickReport::default()
        }
    );
    assert_eq!(job_rx.recv().await.unwrap().monitor_id, a);
    assert_eq!(job_rx.recv().await.unwrap().monitor_id, b);
    assert!(job_rx.try_recv().is_err());
    assert_eq!(store.due_of(&c.to_string()).await, Some(now + 30));
}

#[tokio::test]
async fn test_full_job_channel_reschedules_with_backoff() {
    let store = Arc::new(MemoryStore::new());
    let d = Uuid::new_v4();
    let now = unix_now();
    store.schedule(&d.to_string(), now - 1).await.unwrap();

    let (job_tx, mut job_rx) = mpsc::channel(1);
    let blocker = Uuid::new_v4();
    job_tx.try_send(JobPayload { monitor_id: blocker }).unwrap();

    let report = scheduler(&store, job_tx, 10).tick().await;
    let after = unix_now();

    assert_eq!(report.dispatched, 0);
    assert_eq!(report.backed_off, 1);

    let due = store.due_of(&d.to_string()).await.unwrap();
    assert!(due >= now + BACKPRESSURE_BACKOFF_SECS && due <= after + BACKPRESSURE_BACKOFF_SECS);

    // only the job that was already queued is delivered
    assert_eq!(job_rx.recv().await.unwrap().monitor_id, blocker);
    assert!(job_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_empty_queue_is_an_idle_tick() {
    let store = Arc::new(MemoryStore::new());
    let (job_tx, _job_rx) = mpsc::channel(1);

    let report = scheduler(&store, job_tx, 10).tick().await;

    assert!(report.is_idle());
}
