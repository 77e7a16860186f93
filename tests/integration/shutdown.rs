//! Ordered shutdown: every stage drains before the next one stops

use std::time::Duration;

use heartbeat::actors::alert::AlertService;
use heartbeat::actors::executor::ExecutorHandle;
use heartbeat::actors::messages::JobPayload;
use heartbeat::actors::result::{LaneSizes, ResultProcessor};
use heartbeat::monitors::{HttpChecker, Monitor};
use heartbeat::storage::MonitorRepository;
use heartbeat::store::DueQueue;
use heartbeat::util::unix_now;
use tokio::sync::mpsc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_in_flight_results_are_processed_before_lanes_stop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let mut monitors = Vec::new();
    for _ in 0..8 {
        let monitor = Monitor::new(server.uri(), 300);
        harness.backend.upsert(&monitor).await.unwrap();
        monitors.push(monitor);
    }

    let (job_tx, job_rx) = mpsc::channel(16);
    let (result_tx, result_rx) = mpsc::channel(2);
    let (alert_tx, alert_rx) = mpsc::channel(2);

    let alerts = AlertService::spawn(1, harness.notifier.clone(), "owner@example.com".into(), alert_rx);
    let results = ResultProcessor::spawn(
        LaneSizes {
            success_workers: 1,
            failure_workers: 1,
            success_capacity: 1,
            failure_capacity: 1,
        },
        harness.service.clone(),
        harness.backend.clone(),
        harness.store.clone(),
        result_rx,
        alert_tx,
    );
    let executor = ExecutorHandle::spawn(
        4,
        4,
        HttpChecker::new(Duration::from_secs(2)).unwrap(),
        harness.service.clone(),
        job_rx,
        result_tx,
    );

    for monitor in &monitors {
        job_tx.send(JobPayload { monitor_id: monitor.id }).await.unwrap();
    }
    drop(job_tx);

    // stop immediately, with every check still in flight
    executor.stop().await;
    results.workers_closing_wait().await;
    alerts.worker_closing_wait().await;

    let events = harness.notifier.events().await;
    assert_eq!(events.len(), monitors.len());
    for monitor in &monitors {
        assert!(events.iter().any(|event| event.monitor_id == monitor.id));
        assert!(harness.store.due_of(&monitor.id.to_string()).await.is_some());
    }
}

#[tokio::test]
async fn test_pipeline_shutdown_stops_dispatching() {
    let harness = Harness::new();
    let pipeline = harness.start(&fast_config());

    pipeline.shutdown().await;

    // nothing pops the queue any more
    let member = uuid::Uuid::new_v4().to_string();
    harness.store.schedule(&member, unix_now() - 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(harness.store.len().await, 1);
    assert!(harness.notifier.events().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_completes_with_a_saturated_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .mount(&server)
        .await;

    let harness = Harness::new();
    for _ in 0..20 {
        harness
            .service
            .register(&Monitor::new(server.uri(), 300))
            .await
            .unwrap();
    }

    let mut config = fast_config();
    config.channels.job_capacity = 1;
    config.channels.result_capacity = 1;
    let pipeline = harness.start(&config);

    tokio::time::sleep(Duration::from_millis(150)).await;
    let token = pipeline.token();

    tokio::time::timeout(Duration::from_secs(10), pipeline.shutdown())
        .await
        .expect("shutdown did not complete");

    assert!(token.is_cancelled());

    // every monitor is re-armed, backed off or still queued, except at most
    // the one in flight when the scheduler was cancelled mid-dispatch
    let mut unqueued = 0;
    for monitor in harness.backend.list_active().await.unwrap() {
        if harness.store.due_of(&monitor.id.to_string()).await.is_none() {
            unqueued += 1;
        }
    }
    assert!(unqueued <= 1, "{unqueued} monitors lost their due entry");
}
