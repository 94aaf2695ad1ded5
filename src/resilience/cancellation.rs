//! Cancellation and deadline propagation for workflow calls.
//!
//! Every engine operation takes a [`CallContext`]. Persistence calls and
//! backoff sleeps race against the context's cancellation token and
//! deadline so that in-flight retries stop promptly once either fires.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a call stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The cancellation token fired.
    Cancelled,
    /// The deadline elapsed.
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline carried through a call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context with a fresh token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context driven by an existing token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now. Timeouts too large to represent
    /// leave the context without a deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Returns a child context cancelled together with this one, sharing the
    /// same deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Requests cancellation of every call using this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `true` once the deadline has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Checks the context without waiting.
    ///
    /// # Errors
    ///
    /// Returns the [`Interruption`] that already applies, cancellation
    /// first.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        if self.is_expired() {
            return Err(Interruption::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drives `future` to completion unless the context fires first.
    ///
    /// # Errors
    ///
    /// Returns the [`Interruption`] that stopped the future; the future is
    /// dropped.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interruption>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interruption::Cancelled),
            () = sleep_until_deadline(self.deadline) => Err(Interruption::DeadlineExceeded),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `duration` unless the context fires first.
    ///
    /// # Errors
    ///
    /// Returns the [`Interruption`] that cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interruption> {
        self.run(tokio::time::sleep(duration)).await
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
