use chrono::Utc;

/// Backoff applied when the job channel is saturated
pub const BACKPRESSURE_BACKOFF_SECS: i64 = 2;

/// Delay before retrying a monitor whose definition could not be loaded
pub const LOAD_RETRY_SECS: u32 = 2;

/// Current wall-clock time as Unix seconds (the due-queue score unit)
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Due timestamp `secs` seconds from now
pub fn due_in(secs: i64) -> i64 {
    unix_now() + secs
}

const REDIS_URL: &str = "REDIS_URL";

pub fn get_redis_url() -> Option<String> {
    std::env::var(REDIS_URL).ok()
}

const DATABASE_PATH: &str = "DATABASE_PATH";

pub fn get_database_path() -> Option<String> {
    std::env::var(DATABASE_PATH).ok()
}

const ALERT_ACCESS_KEY: &str = "ALERT_ACCESS_KEY";

pub fn get_alert_access_key() -> Option<String> {
    std::env::var(ALERT_ACCESS_KEY).ok()
}

const APP_ENV: &str = "APP_ENV";

pub fn get_app_env() -> Option<String> {
    std::env::var(APP_ENV).ok()
}
