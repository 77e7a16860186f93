//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Lane workers share one pool
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! The "one open incident per monitor" invariant is enforced by a partial
//! unique index, and `open_or_extend` is a single upsert against that index,
//! so concurrent failure workers cannot open two incidents for one monitor.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::backend::{IncidentStore, MonitorRepository};
use super::error::{StorageError, StorageResult};
use super::schema::{Incident, IncidentUpdate};
use crate::monitors::{CheckRecord, Monitor, MonitorStatus};

const MONITOR_COLUMNS: &str = "id, url, alert_email, interval_secs, timeout_secs, latency_threshold_ms, \
     expected_status, status, last_latency_ms, last_success, last_checked_at";

const INCIDENT_COLUMNS: &str =
    "id, monitor_id, opened_at, last_failure_at, failure_count, last_error, closed_at";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        info!("closing SQLite backend");
        self.pool.close().await;
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn parse_uuid(raw: &str) -> StorageResult<Uuid> {
        Uuid::parse_str(raw)
            .map_err(|e| StorageError::SerializationError(format!("invalid uuid '{raw}': {e}")))
    }

    fn monitor_from_row(row: &SqliteRow) -> StorageResult<Monitor> {
        let id: String = row.get("id");
        let status: String = row.get("status");

        Ok(Monitor {
            id: Self::parse_uuid(&id)?,
            url: row.get("url"),
            alert_email: row.get("alert_email"),
            interval_secs: row.get::<i64, _>("interval_secs") as u32,
            timeout_secs: row.get::<i64, _>("timeout_secs") as u32,
            latency_threshold_ms: row.get::<i64, _>("latency_threshold_ms") as u64,
            expected_status: row.get::<Option<i64>, _>("expected_status").map(|v| v as u16),
            status: status.parse().unwrap_or(MonitorStatus::Unknown),
            last_latency_ms: row.get::<Option<i64>, _>("last_latency_ms").map(|v| v as u64),
            last_success: row.get("last_success"),
            last_checked_at: row
                .get::<Option<i64>, _>("last_checked_at")
                .map(Self::millis_to_timestamp),
        })
    }

    fn incident_from_row(row: &SqliteRow) -> StorageResult<Incident> {
        let monitor_id: String = row.get("monitor_id");

        Ok(Incident {
            id: row.get("id"),
            monitor_id: Self::parse_uuid(&monitor_id)?,
            opened_at: Self::millis_to_timestamp(row.get("opened_at")),
            last_failure_at: Self::millis_to_timestamp(row.get("last_failure_at")),
            failure_count: row.get::<i64, _>("failure_count") as u32,
            last_error: row.get("last_error"),
            closed_at: row
                .get::<Option<i64>, _>("closed_at")
                .map(Self::millis_to_timestamp),
        })
    }
}

#[async_trait]
impl MonitorRepository for SqliteBackend {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> StorageResult<Option<Monitor>> {
        let sql = format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?");

        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::monitor_from_row).transpose()
    }

    #[instrument(skip(self, monitor), fields(monitor_id = %monitor.id))]
    async fn upsert(&self, monitor: &Monitor) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitors (
                id, url, alert_email, interval_secs, timeout_secs, latency_threshold_ms,
                expected_status, status, last_latency_ms, last_success, last_checked_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                url = excluded.url,
                alert_email = excluded.alert_email,
                interval_secs = excluded.interval_secs,
                timeout_secs = excluded.timeout_secs,
                latency_threshold_ms = excluded.latency_threshold_ms,
                expected_status = excluded.expected_status,
                status = excluded.status,
                last_latency_ms = excluded.last_latency_ms,
                last_success = excluded.last_success,
                last_checked_at = excluded.last_checked_at
            "#,
        )
        .bind(monitor.id.to_string())
        .bind(&monitor.url)
        .bind(&monitor.alert_email)
        .bind(monitor.interval_secs as i64)
        .bind(monitor.timeout_secs as i64)
        .bind(monitor.latency_threshold_ms as i64)
        .bind(monitor.expected_status.map(|v| v as i64))
        .bind(monitor.status.to_string())
        .bind(monitor.last_latency_ms.map(|v| v as i64))
        .bind(monitor.last_success)
        .bind(monitor.last_checked_at.as_ref().map(Self::timestamp_to_millis))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> StorageResult<Vec<Monitor>> {
        let sql = format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE status = 'active'");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let monitors = rows
            .iter()
            .map(Self::monitor_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("loaded {} active monitors", monitors.len());
        Ok(monitors)
    }

    #[instrument(skip(self, record))]
    async fn record_check(&self, id: Uuid, record: &CheckRecord) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET last_latency_ms = ?, last_success = ?, last_checked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(record.latency_ms.map(|v| v as i64))
        .bind(record.success)
        .bind(Self::timestamp_to_millis(&record.checked_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("monitor {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for SqliteBackend {
    #[instrument(skip(self, detail))]
    async fn open_or_extend(
        &self,
        monitor_id: Uuid,
        detail: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<IncidentUpdate> {
        let at_millis = Self::timestamp_to_millis(&at);

        let sql = format!(
            r#"
            INSERT INTO incidents (monitor_id, opened_at, last_failure_at, failure_count, last_error)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT (monitor_id) WHERE closed_at IS NULL DO UPDATE SET
                last_failure_at = excluded.last_failure_at,
                failure_count = incidents.failure_count + 1,
                last_error = excluded.last_error
            RETURNING {INCIDENT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(monitor_id.to_string())
            .bind(at_millis)
            .bind(at_millis)
            .bind(detail)
            .fetch_one(&self.pool)
            .await?;

        let incident = Self::incident_from_row(&row)?;
        let opened = incident.failure_count == 1;

        Ok(IncidentUpdate { incident, opened })
    }

    #[instrument(skip(self))]
    async fn close_open(&self, monitor_id: Uuid, at: DateTime<Utc>) -> StorageResult<Option<Incident>> {
        let sql = format!(
            r#"
            UPDATE incidents SET closed_at = ?
            WHERE monitor_id = ? AND closed_at IS NULL
            RETURNING {INCIDENT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(Self::timestamp_to_millis(&at))
            .bind(monitor_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::incident_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn open_incident(&self, monitor_id: Uuid) -> StorageResult<Option<Incident>> {
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_id = ? AND closed_at IS NULL"
        );

        let row = sqlx::query(&sql)
            .bind(monitor_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::incident_from_row).transpose()
    }
}
