//! Bounded retry for store operations that hit SQLite lock contention.

use std::time::Duration;

use agendaworks_core::error::Result;

/// Run `op`, retrying up to `max_attempts` times with a fixed backoff
/// whenever it reports the store as busy. Any other error, and the
/// final busy error, pass straight through.
pub fn with_retry<T>(
    max_attempts: u32,
    backoff: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = max_attempts.max(1);
    let last_try = attempts - 1;
    for attempt in 0..attempts {
        match op() {
            Err(e) if e.is_busy() && attempt < last_try => {
                tracing::debug!("store busy, retrying (attempt {})", attempt + 1);
                std::thread::sleep(backoff);
            }
            other => return other,
        }
    }
    unreachable!("retry loop always returns")
}
