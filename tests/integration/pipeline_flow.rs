//! End-to-end checks through every pipeline stage

use std::sync::Arc;
use std::time::Duration;

use heartbeat::actors::messages::Severity;
use heartbeat::monitors::{Monitor, MonitorStatus};
use heartbeat::service::CachedMonitorService;
use heartbeat::storage::{IncidentStore, MemoryBackend, MonitorRepository};
use heartbeat::store::{DueQueue, MemoryStore, SnapshotCache};
use heartbeat::util::unix_now;
use heartbeat::{Dependencies, Pipeline};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_healthy_check_rearms_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let monitor = Monitor::new(format!("{}/health", server.uri()), 60);
    harness.service.register(&monitor).await.unwrap();

    let before = unix_now();
    let pipeline = harness.start(&fast_config());

    let member = monitor.id.to_string();
    let (store, key) = (&harness.store, member.as_str());
    let rearmed = wait_until(|| async move {
        store
            .due_of(key)
            .await
            .is_some_and(|due| due >= before + 60)
    })
    .await;
    assert!(rearmed, "monitor was not re-armed after its check");

    pipeline.shutdown().await;
    let after = unix_now();

    assert_eq!(harness.store.len().await, 1);
    let due = harness.store.due_of(&member).await.unwrap();
    assert!(due <= after + 60);
    assert!(harness.notifier.events().await.is_empty());

    let stored = harness.backend.get(monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.last_success, Some(true));
}

#[tokio::test]
async fn test_failure_streak_alerts_every_failure_and_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let monitor = Monitor::new(server.uri(), 60).with_alert_email("team@example.com");
    harness.service.register(&monitor).await.unwrap();
    let (id, member) = (monitor.id, monitor.id.to_string());

    let pipeline = harness.start(&fast_config());
    let h = &harness;

    // first failure
    assert!(wait_until(|| async move { h.notifier.events().await.len() == 1 }).await);

    // force the next check instead of waiting a full interval
    harness.store.schedule(&member, unix_now()).await.unwrap();
    assert!(wait_until(|| async move { h.notifier.events().await.len() == 2 }).await);

    let events = harness.notifier.events().await;
    assert!(events.iter().all(|event| event.monitor_id == monitor.id));
    assert_eq!(events[0].severity, Severity::Critical);
    assert_eq!(events[1].severity, Severity::Warning);
    assert_eq!(events[1].failure_count, 2);
    assert_eq!(events[0].recipient.as_deref(), Some("team@example.com"));

    let open = harness.backend.open_incident(monitor.id).await.unwrap().unwrap();
    assert_eq!(open.failure_count, 2);

    // recovery
    harness.store.schedule(&member, unix_now()).await.unwrap();
    assert!(
        wait_until(|| async move { h.backend.open_incident(id).await.unwrap().is_none() }).await
    );

    pipeline.shutdown().await;

    let incidents = harness.backend.incidents_for(monitor.id).await;
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].closed_at.is_some());
    assert_eq!(harness.notifier.events().await.len(), 2, "recovery must not alert");
    assert_eq!(harness.store.incident_marker(monitor.id).await, None);
    assert_eq!(harness.store.len().await, 1);
}

#[tokio::test]
async fn test_unknown_monitor_yields_one_failure() {
    let harness = Harness::new();
    let unknown = Uuid::new_v4();
    harness.store.schedule(&unknown.to_string(), unix_now()).await.unwrap();

    let pipeline = harness.start(&fast_config());
    let h = &harness;
    assert!(wait_until(|| async move { !h.notifier.events().await.is_empty() }).await);

    pipeline.shutdown().await;

    let events = harness.notifier.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].monitor_id, unknown);
    assert_eq!(events[0].error, "monitor not found");

    // unknown monitors are not re-armed
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_latency_threshold_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(200)))
        .mount(&server)
        .await;

    let harness = Harness::new();
    let monitor = Monitor::new(server.uri(), 60).with_latency_threshold(50);
    harness.service.register(&monitor).await.unwrap();

    let pipeline = harness.start(&fast_config());
    let h = &harness;
    assert!(wait_until(|| async move { !h.notifier.events().await.is_empty() }).await);
    pipeline.shutdown().await;

    let events = harness.notifier.events().await;
    assert_eq!(events[0].status_code, Some(200));
    assert!(events[0].error.contains("latency"));
}

#[tokio::test]
async fn test_store_error_defers_check_instead_of_dropping_monitor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let repository = Arc::new(FlakyRepository::failing(1));
    let store = Arc::new(MemoryStore::new());
    let incidents = Arc::new(MemoryBackend::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = Arc::new(CachedMonitorService::new(
        repository.clone(),
        store.clone(),
        store.clone(),
    ));

    // not cached, so the first resolution hits the failing repository
    let monitor = Monitor::new(server.uri(), 60);
    repository.upsert(&monitor).await.unwrap();
    let member = monitor.id.to_string();
    store.schedule(&member, unix_now()).await.unwrap();

    let before = unix_now();
    let pipeline = Pipeline::start(
        &fast_config(),
        Dependencies {
            queue: store.clone(),
            service,
            incidents: incidents.clone(),
            notifier: notifier.clone(),
        },
    )
    .unwrap();

    let (queue, key) = (&store, member.as_str());
    let checked = wait_until(|| async move {
        queue
            .due_of(key)
            .await
            .is_some_and(|due| due >= before + 60)
    })
    .await;
    pipeline.shutdown().await;

    assert!(checked, "monitor was dropped from the schedule after a store error");
    assert_eq!(store.len().await, 1);
    assert!(notifier.events().await.is_empty());
    assert!(incidents.incidents_for(monitor.id).await.is_empty());

    let stored = repository.inner.get(monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.last_success, Some(true));
}

#[tokio::test]
async fn test_paused_monitor_is_neither_checked_nor_rearmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = Harness::new();
    let mut monitor = Monitor::new(server.uri(), 60);
    monitor.status = MonitorStatus::Paused;

    // paused behind the scheduler's back, its due entry is still queued
    harness.backend.upsert(&monitor).await.unwrap();
    harness.store.set_monitor(&monitor).await.unwrap();
    harness.store.schedule(&monitor.id.to_string(), unix_now()).await.unwrap();

    let pipeline = harness.start(&fast_config());
    let h = &harness;
    assert!(wait_until(|| async move { h.store.is_empty().await }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    pipeline.shutdown().await;

    assert!(harness.store.is_empty().await);
    assert!(harness.notifier.events().await.is_empty());
    let stored = harness.backend.get(monitor.id).await.unwrap().unwrap();
    assert_eq!(stored.last_checked_at, None);
}
