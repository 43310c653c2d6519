//! Cooperative cancellation for learning.
//!
//! A [`CancellationToken`] is handed to a session by the caller; the engine polls it through a
//! [`Budget`] at cap boundaries (between examples, between intersections, between significance
//! checks). Nothing shared is mutated until learning completes, so abandoning a run leaves the
//! session exactly as it was before the call.

use crate::{Error, Result};
use std::time::{Duration, Instant};

pub use tokio_util::sync::CancellationToken;

/// Deadline and cancellation state for one learn call.
#[derive(Debug, Clone)]
pub struct Budget {
    token: CancellationToken,
    start: Instant,
    timeout: Option<Duration>,
}

impl Budget {
    /// A budget that runs out when `token` is cancelled or `timeout` has passed since now.
    pub fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            start: Instant::now(),
            timeout,
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    /// Returns [`Error::Cancelled`] once the token is raised or the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            if self.start.elapsed() > timeout {
                tracing::debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "learn_deadline_exceeded"
                );
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}
