//! Fail-open utilities for graceful degradation
//!
//! For infrastructure work that must never fail a session or a test run:
//! the activity log, session trace persistence, failure artifact capture.
//!
//! DO NOT use fail-open for model inference, browser actions or lifecycle
//! transitions. Those errors are the result.

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use scout_core::fail_open::fail_open;
/// use scout_core::Result;
///
/// async fn append_activity() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let logged = fail_open("activity_log", || append_activity()).await;
///     // logged is None if append_activity() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
