use std::sync::Arc;

use clap::Parser;
use heartbeat::{
    Dependencies, Pipeline,
    alerts::build_notifier,
    config::{Config, load_config},
    service::CachedMonitorService,
    storage::{IncidentStore, MemoryBackend, MonitorRepository},
    store::{DueQueue, MemoryStore, RedisStore, SnapshotCache},
};
#[cfg(feature = "storage-sqlite")]
use heartbeat::storage::sqlite::SqliteBackend;
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Keep the due queue and monitors in memory instead of Redis and SQLite
    #[arg(long)]
    in_memory: bool,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("heartbeat", level),
        ("heartbeat_daemon", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

struct Backends {
    queue: Arc<dyn DueQueue>,
    cache: Arc<dyn SnapshotCache>,
    repository: Arc<dyn MonitorRepository>,
    incidents: Arc<dyn IncidentStore>,

    /// Closed once the pipeline has drained
    #[cfg(feature = "storage-sqlite")]
    sqlite: Option<Arc<SqliteBackend>>,
}

async fn connect(config: &Config, in_memory: bool) -> anyhow::Result<Backends> {
    if in_memory {
        warn!("running in memory, nothing survives a restart");
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(MemoryBackend::new());
        return Ok(Backends {
            queue: store.clone(),
            cache: store,
            repository: backend.clone(),
            incidents: backend,
            #[cfg(feature = "storage-sqlite")]
            sqlite: None,
        });
    }

    let store = Arc::new(RedisStore::connect(&config.redis).await?);
    info!("due queue lives in redis key '{}'", store.due_key());

    #[cfg(feature = "storage-sqlite")]
    let backend = Arc::new(SqliteBackend::new(&config.database.path).await?);

    #[cfg(not(feature = "storage-sqlite"))]
    let backend = {
        warn!("built without SQLite support, monitors and incidents are kept in memory");
        Arc::new(MemoryBackend::new())
    };

    Ok(Backends {
        queue: store.clone(),
        cache: store,
        repository: backend.clone(),
        #[cfg(feature = "storage-sqlite")]
        sqlite: Some(backend.clone()),
        incidents: backend,
    })
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = load_config(&args.file)?;
    init(config.log_level());
    trace!("started with args: {args:?}");

    let backends = connect(&config, args.in_memory).await?;
    let service = Arc::new(CachedMonitorService::new(
        backends.repository,
        backends.cache,
        backends.queue.clone(),
    ));

    for monitor in &config.monitors {
        service.register(&monitor.to_monitor()).await?;
    }
    service.bootstrap().await?;

    let pipeline = Pipeline::start(
        &config,
        Dependencies {
            queue: backends.queue,
            service,
            incidents: backends.incidents,
            notifier: build_notifier(&config.alert)?,
        },
    )?;

    shutdown_signal().await?;
    info!("received shutdown signal");

    pipeline.shutdown().await;

    #[cfg(feature = "storage-sqlite")]
    if let Some(sqlite) = backends.sqlite {
        sqlite.close().await;
    }

    Ok(())
}
