//! Message types flowing through the pipeline channels
//!
//! ```text
//! Scheduler ─JobPayload─▶ Executor ─HttpResult─▶ ResultProcessor ─AlertEvent─▶ AlertService
//! ```
//!
//! Every message is consumed by exactly one worker. None of them is persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::monitors::Monitor;
use crate::util::LOAD_RETRY_SECS;

/// Work item produced when the scheduler pops a due entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPayload {
    pub monitor_id: Uuid,
}

/// How a job ended, which decides whether and when the monitor is re-armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The check ran; re-arm after the monitor's interval
    Checked { interval_secs: u32 },
    /// The monitor does not exist; never re-armed
    Unknown,
    /// The monitor could not be loaded; re-armed after a short backoff
    Deferred,
    /// The monitor is paused or disabled; dropped by the router
    Inactive,
}

/// Structured result of one check
///
/// Exactly one result is produced per job, even when no check was made
/// (then `success` is false and `disposition` says why).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResult {
    pub monitor_id: Uuid,

    pub success: bool,

    /// HTTP status code, `None` on transport errors
    pub status_code: Option<u16>,

    /// Round-trip time, `None` when no request was made
    pub latency_ms: Option<u64>,

    /// Failure reason
    pub error: Option<String>,

    /// URL that was checked (empty if the monitor did not resolve)
    pub url: String,

    pub disposition: Disposition,

    /// Owner address for alerts
    pub alert_email: Option<String>,

    pub checked_at: DateTime<Utc>,
}

impl HttpResult {
    /// Failure for a job whose monitor does not exist
    pub fn unresolved(monitor_id: Uuid, reason: impl Into<String>) -> Self {
        Self::unchecked(monitor_id, reason, Disposition::Unknown)
    }

    /// Result for a job whose monitor could not be loaded right now
    pub fn deferred(monitor_id: Uuid, reason: impl Into<String>) -> Self {
        Self::unchecked(monitor_id, reason, Disposition::Deferred)
    }

    /// Result for a job whose monitor is no longer active
    pub fn inactive(monitor: &Monitor) -> Self {
        Self {
            url: monitor.url.clone(),
            alert_email: monitor.alert_email.clone(),
            ..Self::unchecked(monitor.id, format!("monitor is {}", monitor.status), Disposition::Inactive)
        }
    }

    fn unchecked(monitor_id: Uuid, reason: impl Into<String>, disposition: Disposition) -> Self {
        Self {
            monitor_id,
            success: false,
            status_code: None,
            latency_ms: None,
            error: Some(reason.into()),
            url: String::new(),
            disposition,
            alert_email: None,
            checked_at: Utc::now(),
        }
    }

    /// Seconds until the next check, `None` if the monitor must not be re-armed
    pub fn rearm_after(&self) -> Option<u32> {
        match self.disposition {
            Disposition::Checked { interval_secs } => Some(interval_secs),
            Disposition::Deferred => Some(LOAD_RETRY_SECS),
            Disposition::Unknown | Disposition::Inactive => None,
        }
    }

    pub fn detail(&self) -> String {
        match (&self.error, self.status_code) {
            (Some(error), _) => error.clone(),
            (None, Some(code)) => format!("status code {code}"),
            (None, None) => "unknown failure".to_string(),
        }
    }
}

/// How urgent an alert is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The failure opened a new incident
    Critical,
    /// The failure extended an already open incident
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Event emitted by the failure lane for every failing check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub monitor_id: Uuid,

    /// Incident the failure belongs to, `None` if the incident store failed
    pub incident_id: Option<i64>,

    pub severity: Severity,

    pub url: String,

    pub error: String,

    pub status_code: Option<u16>,

    pub latency_ms: Option<u64>,

    /// Consecutive failures in the current incident
    pub failure_count: u32,

    /// Monitor owner, the alert service falls back to its configured owner
    pub recipient: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn subject(&self) -> String {
        let target = if self.url.is_empty() {
            self.monitor_id.to_string()
        } else {
            self.url.clone()
        };

        match self.severity {
            Severity::Critical => format!("[DOWN] {target}"),
            Severity::Warning => format!("[STILL DOWN] {target} ({} failures)", self.failure_count),
        }
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Monitor: {}", self.monitor_id),
            format!("Severity: {}", self.severity),
        ];
        if !self.url.is_empty() {
            lines.push(format!("URL: {}", self.url));
        }
        lines.push(format!("Error: {}", self.error));
        if let Some(code) = self.status_code {
            lines.push(format!("Status code: {code}"));
        }
        if let Some(latency) = self.latency_ms {
            lines.push(format!("Latency: {latency}ms"));
        }
        if let Some(incident) = self.incident_id {
            lines.push(format!("Incident: #{incident} ({} failures)", self.failure_count));
        }
        lines.push(format!("Time: {}", self.timestamp.to_rfc3339()));
        lines.join("\n")
    }
}
