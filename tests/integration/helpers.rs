//! Helper functions for integration tests

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use heartbeat::actors::messages::AlertEvent;
use heartbeat::alerts::Notifier;
use heartbeat::config::Config;
use heartbeat::monitors::{CheckRecord, Monitor};
use heartbeat::service::CachedMonitorService;
use heartbeat::storage::{MemoryBackend, MonitorRepository, StorageError, StorageResult};
use heartbeat::store::MemoryStore;
use heartbeat::{Dependencies, Pipeline};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Notifier that keeps every delivered event
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<AlertEvent>>,
}

impl RecordingNotifier {
    pub async fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &AlertEvent, _recipient: &str) -> anyhow::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Repository whose first `failures` reads fail with a connection error
pub struct FlakyRepository {
    pub inner: MemoryBackend,
    failures: AtomicUsize,
}

impl FlakyRepository {
    pub fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryBackend::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl MonitorRepository for FlakyRepository {
    async fn get(&self, id: Uuid) -> StorageResult<Option<Monitor>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::ConnectionFailed("connection reset".to_string()));
        }
        self.inner.get(id).await
    }

    async fn upsert(&self, monitor: &Monitor) -> StorageResult<()> {
        self.inner.upsert(monitor).await
    }

    async fn list_active(&self) -> StorageResult<Vec<Monitor>> {
        self.inner.list_active().await
    }

    async fn record_check(&self, id: Uuid, record: &CheckRecord) -> StorageResult<()> {
        self.inner.record_check(id, record).await
    }
}

/// In-memory stores plus the service built on top of them
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<MemoryBackend>,
    pub service: Arc<CachedMonitorService>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryBackend::new());
        let service = Arc::new(CachedMonitorService::new(
            backend.clone(),
            store.clone(),
            store.clone(),
        ));

        Self {
            store,
            backend,
            service,
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn start(&self, config: &Config) -> Pipeline {
        Pipeline::start(
            config,
            Dependencies {
                queue: self.store.clone(),
                service: self.service.clone(),
                incidents: self.backend.clone(),
                notifier: self.notifier.clone(),
            },
        )
        .unwrap()
    }
}

/// Small pools and a fast tick
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.scheduler.interval_ms = 20;
    config.scheduler.batch_size = 10;
    config.executor.worker_count = 2;
    config.executor.max_in_flight = 2;
    config.executor.http_timeout_secs = 2;
    config.result_processor.success_workers = 2;
    config.result_processor.failure_workers = 2;
    config.alert.worker_count = 2;
    config
}

/// Poll `condition` until it holds or five seconds have passed
pub async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
