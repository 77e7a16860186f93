use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::StoreResult;

/// Attempts made for store writes before giving up
pub const WRITE_ATTEMPTS: usize = 3;

/// Run `op` up to `attempts` times, sleeping 50ms × attempt between tries
pub async fn retry<T, F, Fut>(attempts: usize, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!("store operation failed (attempt {attempt}/{attempts}): {e}");
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
