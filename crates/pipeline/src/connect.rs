//! Connection supervision.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::time::Duration;
use thermo_remote::{Connector, SessionHandle};

/// Bounded exponential backoff for establishing the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below one are treated as one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each subsequent one.
    pub base_delay: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}
impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`
    /// (counting from one): `base * 2^(attempt - 1)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Open a session, retrying transient connection failures.
///
/// Failures that retrying cannot fix (rejected credentials, a root folder we
/// may not enter) abort immediately.
///
/// # Errors
/// [`ErrorKind::Connect`] wrapping the last remote error.
pub async fn connect(connector: &dyn Connector, policy: RetryPolicy) -> Result<SessionHandle> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match connector.connect().await {
            Ok(session) => {
                tracing::info!(server = connector.name(), attempt, "Connected to remote server");
                return Ok(session);
            },
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(server = connector.name(), attempt, error = %e, delay_ms = delay.as_millis() as u64, "Connection attempt failed; retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => {
                tracing::error!(server = connector.name(), attempt, error = %e, "Could not connect to remote server");
                return Err(e).or_raise(|| ErrorKind::Connect);
            },
        }
    }
}
