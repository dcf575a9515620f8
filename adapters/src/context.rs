//! Per-call cancellation and deadline

use crate::{ProviderError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal and optional deadline handed to every network-bound
/// provider operation.
///
/// Cloning shares the cancellation token, so cancelling any clone aborts every
/// call running under it.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// Context without deadline that is never cancelled unless asked to
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now (keeps an earlier existing deadline)
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Expire at `deadline` (keeps an earlier existing deadline)
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Child context: cancelled with this one, but can be cancelled alone
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    /// Token that cancels calls made under this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every call made under this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `future` until it finishes, the context is cancelled or the
    /// deadline passes. The future is dropped on cancellation or expiry,
    /// which aborts any in-flight request it owns.
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::cancelled(operation));
        }

        match self.deadline {
            Some(deadline) => {
                if deadline <= Instant::now() {
                    return Err(ProviderError::timeout(operation));
                }

                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(ProviderError::cancelled(operation)),
                    result = tokio::time::timeout_at(deadline, future) => {
                        result.unwrap_or_else(|_| Err(ProviderError::timeout(operation)))
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(ProviderError::cancelled(operation)),
                    result = future => result,
                }
            }
        }
    }
}
