//! Cancellation and deadline scope for blocking operations.
//!
//! Every operation that can wait on the engine takes a [`CallContext`].
//! A context ends when its token is cancelled (directly or through a
//! parent) or when its deadline passes, whichever comes first.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use dataplane_link::CallContext;
//!
//! let cx = CallContext::new().with_timeout(Duration::from_secs(5));
//! let reply = handle.invoke(&cx, request).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

// ============================================================================
// CallContext
// ============================================================================

/// Cancellation token plus optional deadline.
///
/// Cloning shares the token: cancelling any clone ends all of them.
/// Use [`CallContext::child`] for a scope that can be ended independently.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Cancellation token.
    token: CancellationToken,
    /// Absolute deadline, if any.
    deadline: Option<Instant>,
}

impl CallContext {
    /// Creates a context with no deadline.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the deadline. An earlier existing deadline is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Sets the deadline to `timeout` from now.
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child scope: ends with the parent, but cancelling the child
    /// leaves the parent untouched.
    #[inline]
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Ends this context and every child.
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the underlying token.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the deadline, if any.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left until the deadline (zero once passed).
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the token is cancelled or the deadline passed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled()
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Completes when the context ends. Cancel-safe.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Runs `future` until it completes or the context ends.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] naming `operation` if the context ends
    /// first, otherwise whatever `future` returns.
    pub async fn run<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = self.done() => Err(Error::cancelled(operation)),
            result = future => result,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_not_done() {
        let cx = CallContext::new();
        assert!(!cx.is_done());
        assert!(cx.deadline().is_none());
        assert!(cx.remaining().is_none());
    }

    #[test]
    fn test_child_ends_with_parent() {
        let parent = CallContext::new();
        let child = parent.child();

        parent.cancel();
        assert!(child.is_done());
    }

    #[test]
    fn test_cancelling_child_spares_parent() {
        let parent = CallContext::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test]
    async fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let cx = CallContext::new()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));

        assert_eq!(cx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_done_fires_on_deadline() {
        let cx = CallContext::new().with_timeout(Duration::from_millis(20));
        tokio::time::timeout(Duration::from_secs(2), cx.done())
            .await
            .expect("deadline should end the context");
        assert!(cx.is_done());
    }

    #[tokio::test]
    async fn test_run_returns_cancelled() {
        let cx = CallContext::new();
        cx.cancel();

        let result: Result<()> = cx
            .run("never", std::future::pending::<Result<()>>())
            .await;
        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Cancelled: never");
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let cx = CallContext::new();
        let value = cx.run("ready", async { Ok(7) }).await.expect("ok");
        assert_eq!(value, 7);
    }
}
