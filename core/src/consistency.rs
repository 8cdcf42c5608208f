//! Read-after-write helper for the CQRS split.
//!
//! The projection lags the write model: after a mutation is
//! acknowledged, the corresponding pet_status update is not guaranteed
//! to be visible immediately. Callers that need fresh post-mutation
//! state poll with a bounded retry loop instead of reading once.

use crate::error::SimResult;
use std::time::Duration;

/// Poll `read` up to `attempts` times, sleeping `delay` between tries,
/// until it yields a value. Returns `Ok(None)` when every attempt came
/// back empty — the caller decides whether that is an error.
///
/// Errors from `read` abort the loop immediately; only "not there yet"
/// (`Ok(None)`) is retried.
pub fn poll_until<T, F>(attempts: usize, delay: Duration, mut read: F) -> SimResult<Option<T>>
where
    F: FnMut() -> SimResult<Option<T>>,
{
    for attempt in 0..attempts {
        if let Some(value) = read()? {
            return Ok(Some(value));
        }
        if attempt + 1 < attempts {
            std::thread::sleep(delay);
        }
    }
    Ok(None)
}
