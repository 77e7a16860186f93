//! Incident records
//!
//! An incident is a failure streak of one monitor:
//!
//! ```text
//! success ─▶ failure      opens   (failure_count = 1)
//! failure ─▶ failure      extends (failure_count += 1)
//! failure ─▶ success      closes  (closed_at set)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,

    pub monitor_id: Uuid,

    pub opened_at: DateTime<Utc>,

    pub last_failure_at: DateTime<Utc>,

    /// Failures recorded since the incident opened (at least 1)
    pub failure_count: u32,

    /// Error detail of the most recent failure
    pub last_error: String,

    /// `None` while the incident is open
    pub closed_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// Result of recording a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentUpdate {
    pub incident: Incident,

    /// True when this failure opened the incident
    pub opened: bool,
}
