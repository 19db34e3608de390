use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a [`Scope`] stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token with an optional deadline.
///
/// Children stop when their parent is cancelled and never outlive the
/// parent's deadline. Cancelling a child leaves the parent running.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Root scope, only ended by an explicit [`Scope::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child scope that also ends `timeout` from now. Timeouts too large to
    /// represent are treated as unbounded.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (Instant::now().checked_add(timeout), self.deadline) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reason the scope ended, or `None` while it is still running.
    pub fn end_reason(&self) -> Option<ScopeEnd> {
        if self.token.is_cancelled() {
            return Some(ScopeEnd::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScopeEnd::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.end_reason().is_some()
    }

    /// Resolves once the scope ends.
    pub async fn done(&self) {
        let _ = self.ended().await;
    }

    pub async fn ended(&self) -> ScopeEnd {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ScopeEnd::Cancelled,
                _ = sleep_until(deadline) => ScopeEnd::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ScopeEnd::Cancelled
            }
        }
    }

    /// Runs `fut` until it completes or the scope ends, whichever is first.
    /// `fut` is never polled once the scope has already ended.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ScopeEnd> {
        if let Some(end) = self.end_reason() {
            return Err(end);
        }
        tokio::select! {
            biased;
            end = self.ended() => Err(end),
            output = fut => Ok(output),
        }
    }
}
