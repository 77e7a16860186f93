use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use tracing::level_filters::LevelFilter;
use tracing::trace;
use uuid::Uuid;

use crate::monitors::Monitor;
use crate::util;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// `production` logs at INFO, anything else at DEBUG
    #[serde(default = "default_env")]
    pub env: String,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub result_processor: ResultProcessorConfig,

    #[serde(default)]
    pub alert: AlertConfig,

    #[serde(default)]
    pub channels: ChannelConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Monitors registered on startup
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: default_env(),
            scheduler: SchedulerConfig::default(),
            executor: ExecutorConfig::default(),
            result_processor: ResultProcessorConfig::default(),
            alert: AlertConfig::default(),
            channels: ChannelConfig::default(),
            redis: RedisConfig::default(),
            database: DatabaseConfig::default(),
            monitors: Vec::new(),
        }
    }
}

fn default_env() -> String {
    String::from("development")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,

    /// Maximum entries popped per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_tick_interval_ms() -> u64 {
    30_000
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_workers")]
    pub worker_count: usize,

    /// Maximum number of HTTP checks in flight, independent of `worker_count`
    #[serde(default = "default_http_limit")]
    pub max_in_flight: usize,

    /// Used for monitors without their own timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_executor_workers(),
            max_in_flight: default_http_limit(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl ExecutorConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_executor_workers() -> usize {
    20
}

fn default_http_limit() -> usize {
    100
}

fn default_http_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ResultProcessorConfig {
    #[serde(default = "default_lane_workers")]
    pub success_workers: usize,

    #[serde(default = "default_lane_workers")]
    pub failure_workers: usize,

    #[serde(default = "default_channel_capacity")]
    pub success_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub failure_capacity: usize,
}

impl Default for ResultProcessorConfig {
    fn default() -> Self {
        Self {
            success_workers: default_lane_workers(),
            failure_workers: default_lane_workers(),
            success_capacity: default_channel_capacity(),
            failure_capacity: default_channel_capacity(),
        }
    }
}

fn default_lane_workers() -> usize {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_workers")]
    pub worker_count: usize,

    /// Recipient for monitors without their own alert address
    #[serde(default = "default_owner_email")]
    pub owner_email: String,

    /// Bearer key of the e-mail API, overridden by `ALERT_ACCESS_KEY`
    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub channel: AlertChannel,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            worker_count: default_alert_workers(),
            owner_email: default_owner_email(),
            access_key: None,
            channel: AlertChannel::default(),
        }
    }
}

fn default_alert_workers() -> usize {
    10
}

fn default_owner_email() -> String {
    String::from("admin@example.com")
}

/// Where alert events are delivered to
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AlertChannel {
    Email(Email),
    Webhook(Webhook),
    Discord(Discord),
    #[default]
    Log,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Email {
    /// Endpoint of the e-mail HTTP API
    pub api_url: String,
    pub from: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_capacity")]
    pub job_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub result_capacity: usize,

    #[serde(default = "default_channel_capacity")]
    pub alert_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            job_capacity: default_channel_capacity(),
            result_capacity: default_channel_capacity(),
            alert_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    500
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Bound on establishing a connection, including reconnects
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    /// Bound on waiting for the reply to a single command
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Sorted set holding the due entries
    #[serde(default = "default_due_key")]
    pub due_key: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            dial_timeout_ms: default_dial_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            due_key: default_due_key(),
        }
    }
}

fn default_redis_url() -> String {
    String::from("redis://localhost:6379")
}

fn default_dial_timeout_ms() -> u64 {
    5_000
}

fn default_response_timeout_ms() -> u64 {
    3_000
}

impl RedisConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

fn default_due_key() -> String {
    String::from("monitors:due")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./monitors.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    pub id: Uuid,
    pub url: String,
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u32,
    #[serde(default)]
    pub timeout_secs: u32,
    #[serde(default)]
    pub latency_threshold_ms: u64,
    pub expected_status: Option<u16>,
    pub alert_email: Option<String>,
}

fn default_monitor_interval() -> u32 {
    60
}

impl MonitorConfig {
    pub fn to_monitor(&self) -> Monitor {
        let mut monitor = Monitor::new(&self.url, self.interval_secs)
            .with_timeout(self.timeout_secs)
            .with_latency_threshold(self.latency_threshold_ms);
        monitor.id = self.id;
        monitor.expected_status = self.expected_status;
        monitor.alert_email = self.alert_email.clone();
        monitor
    }
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.is_production() {
            LevelFilter::INFO
        } else {
            LevelFilter::DEBUG
        }
    }

    /// Apply `REDIS_URL`, `DATABASE_PATH`, `ALERT_ACCESS_KEY` and `APP_ENV`
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = util::get_redis_url() {
            self.redis.url = url;
        }
        if let Some(path) = util::get_database_path() {
            self.database.path = PathBuf::from(path);
        }
        if let Some(key) = util::get_alert_access_key() {
            self.alert.access_key = Some(key);
        }
        if let Some(env) = util::get_app_env() {
            self.env = env;
        }
    }

    /// Reject zero counts and capacities, naming every offending field
    pub fn validate(&self) -> anyhow::Result<()> {
        let counts = [
            ("scheduler.interval_ms", self.scheduler.interval_ms as usize),
            ("scheduler.batch_size", self.scheduler.batch_size),
            ("executor.worker_count", self.executor.worker_count),
            ("executor.max_in_flight", self.executor.max_in_flight),
            ("executor.http_timeout_secs", self.executor.http_timeout_secs as usize),
            ("result_processor.success_workers", self.result_processor.success_workers),
            ("result_processor.failure_workers", self.result_processor.failure_workers),
            ("result_processor.success_capacity", self.result_processor.success_capacity),
            ("result_processor.failure_capacity", self.result_processor.failure_capacity),
            ("alert.worker_count", self.alert.worker_count),
            ("channels.job_capacity", self.channels.job_capacity),
            ("channels.result_capacity", self.channels.result_capacity),
            ("channels.alert_capacity", self.channels.alert_capacity),
            ("redis.dial_timeout_ms", self.redis.dial_timeout_ms as usize),
            ("redis.response_timeout_ms", self.redis.response_timeout_ms as usize),
        ];

        let invalid = counts
            .iter()
            .filter(|(_, value)| *value == 0)
            .map(|(name, _)| *name)
            .collect::<Vec<_>>();

        if !invalid.is_empty() {
            bail!("invalid configuration, must be greater than zero: {}", invalid.join(", "));
        }

        if let Some(monitor) = self.monitors.iter().find(|monitor| monitor.interval_secs == 0) {
            bail!("invalid configuration, monitor {} has a zero interval", monitor.id);
        }

        Ok(())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Read the config file, apply environment overrides and validate the result
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut config = read_config_file(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
