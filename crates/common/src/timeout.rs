//! Per-request deadline shared by every collaborator call of a pipeline run.

use std::time::{Duration, Instant};

use error_stack::Report;

use crate::error::SetuidError;

/// A fixed point in time after which a request must stop waiting.
///
/// Created once at the start of a request and handed unchanged to each
/// downstream call. Nothing in the pipeline retries after it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Fail with [`SetuidError::Timeout`] once the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns a timeout report naming `stage` when the deadline is exhausted.
    pub fn ensure_not_expired(&self, stage: &str) -> Result<(), Report<SetuidError>> {
        if self.is_expired() {
            return Err(Report::new(SetuidError::Timeout {
                message: format!("{stage} did not complete before the request deadline"),
            }));
        }
        Ok(())
    }
}
