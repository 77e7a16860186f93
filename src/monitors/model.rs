use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Administrative status of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Active,
    Paused,
    #[default]
    Unknown,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Active => write!(f, "active"),
            MonitorStatus::Paused => write!(f, "paused"),
            MonitorStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for MonitorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MonitorStatus::Active),
            "paused" => Ok(MonitorStatus::Paused),
            "unknown" => Ok(MonitorStatus::Unknown),
            other => Err(format!("unknown monitor status '{other}'")),
        }
    }
}

/// A registered monitor
///
/// The administrative layer owns monitors. The pipeline only reads cached
/// snapshots and writes back the outcome of the last check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Uuid,

    /// Endpoint that is checked with a GET request
    pub url: String,

    /// Owner address for alerts (falls back to the configured owner)
    pub alert_email: Option<String>,

    /// Seconds between two checks
    pub interval_secs: u32,

    /// Per-check timeout, 0 means "use the pipeline default"
    #[serde(default)]
    pub timeout_secs: u32,

    /// Responses slower than this are failures, 0 disables the check
    #[serde(default)]
    pub latency_threshold_ms: u64,

    /// Exact status code expected, any 2xx when unset
    #[serde(default)]
    pub expected_status: Option<u16>,

    #[serde(default)]
    pub status: MonitorStatus,

    #[serde(default)]
    pub last_latency_ms: Option<u64>,

    #[serde(default)]
    pub last_success: Option<bool>,

    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Monitor {
    /// Create an active monitor with defaults for everything but URL and interval
    pub fn new(url: impl Into<String>, interval_secs: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            alert_email: None,
            interval_secs,
            timeout_secs: 0,
            latency_threshold_ms: 0,
            expected_status: None,
            status: MonitorStatus::Active,
            last_latency_ms: None,
            last_success: None,
            last_checked_at: None,
        }
    }

    pub fn with_alert_email(mut self, email: impl Into<String>) -> Self {
        self.alert_email = Some(email.into());
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn with_latency_threshold(mut self, millis: u64) -> Self {
        self.latency_threshold_ms = millis;
        self
    }

    pub fn with_timeout(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == MonitorStatus::Active
    }

    pub fn apply_check(&mut self, record: &CheckRecord) {
        self.last_latency_ms = record.latency_ms;
        self.last_success = Some(record.success);
        self.last_checked_at = Some(record.checked_at);
    }
}

/// Outcome of one check, written back onto the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub success: bool,
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
}
