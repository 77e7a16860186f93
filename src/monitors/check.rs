//! HTTP check against a single monitor
//!
//! The check is a plain GET request. A check succeeds when:
//! 1. The status code matches the expected code (or is 2xx if not specified)
//! 2. The response arrived within the latency threshold (if configured)
//!
//! Transport errors and timeouts are failures carrying the error text.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{instrument, trace};

use super::model::Monitor;

/// Result of one HTTP check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Performs checks with a shared HTTP client
///
/// The client is reused across requests; the timeout is applied per request
/// because every monitor may carry its own.
#[derive(Debug, Clone)]
pub struct HttpChecker {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpChecker {
    pub fn new(default_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("heartbeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            default_timeout,
        })
    }

    pub fn timeout_for(&self, monitor: &Monitor) -> Duration {
        if monitor.timeout_secs > 0 {
            Duration::from_secs(monitor.timeout_secs as u64)
        } else {
            self.default_timeout
        }
    }

    #[instrument(skip(self, monitor), fields(monitor_id = %monitor.id))]
    pub async fn check(&self, monitor: &Monitor) -> CheckOutcome {
        let timeout = self.timeout_for(monitor);
        trace!("checking {} (timeout {:?})", monitor.url, timeout);

        let start = Instant::now();
        let response = self.client.get(&monitor.url).timeout(timeout).send().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let error = classify(monitor, status_code, latency_ms);

                CheckOutcome {
                    success: error.is_none(),
                    status_code: Some(status_code),
                    latency_ms,
                    error,
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("request timed out after {}ms", timeout.as_millis())
                } else {
                    format!("request failed: {e}")
                };

                CheckOutcome {
                    success: false,
                    status_code: None,
                    latency_ms,
                    error: Some(error),
                }
            }
        }
    }
}

/// Decide whether a response counts as healthy
///
/// Returns the failure reason, `None` when the response is healthy.
pub fn classify(monitor: &Monitor, status_code: u16, latency_ms: u64) -> Option<String> {
    let status_ok = match monitor.expected_status {
        Some(expected) => expected == status_code,
        None => (200..300).contains(&status_code),
    };

    if !status_ok {
        let expected = monitor
            .expected_status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "2xx".to_string());
        return Some(format!(
            "unexpected status code: {status_code} (expected {expected})"
        ));
    }

    if monitor.latency_threshold_ms > 0 && latency_ms > monitor.latency_threshold_ms {
        return Some(format!(
            "latency {latency_ms}ms exceeded threshold of {}ms",
            monitor.latency_threshold_ms
        ));
    }

    None
}
