//! Exponential backoff for transient store failures.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;

/// Backoff schedule before giving up.
const BACKOFF: [Duration; 3] = [
    Duration::from_millis(50),
    Duration::from_millis(200),
    Duration::from_secs(1),
];

/// Runs `op`, retrying transient [`StoreError::Unavailable`] failures
/// with the standard backoff (50 ms, 200 ms, 1 s). Non-transient errors
/// and exhaustion surface to the caller unchanged.
pub fn with_retry<T>(
    operation: &str,
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < BACKOFF.len() => {
                warn!(operation, attempt, error = %e, "transient store failure, retrying");
                thread::sleep(BACKOFF[attempt]);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
