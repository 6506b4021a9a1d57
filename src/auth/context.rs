//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::AuthError;

/// Cancellation signal and optional deadline supplied by the caller of a
/// service operation.
///
/// When either fires, the operation stops waiting and the in-flight store
/// future is dropped. A store mutation that had already committed stays
/// committed; only its result is not reported.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context with no deadline that is never cancelled unless asked to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keep the earliest of the current and the given deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `operation` until it finishes, the context is cancelled or the
    /// deadline passes, whichever comes first.
    ///
    /// # Errors
    /// Returns `Cancelled`/`DeadlineExceeded` when the context fires first,
    /// otherwise the operation's own result.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(AuthError::DeadlineExceeded);
        }

        let deadline = self.deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AuthError::Cancelled),
            () = sleep_until(deadline), if self.deadline.is_some() => {
                Err(AuthError::DeadlineExceeded)
            }
            result = operation => result,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_without_deadline() {
        let ctx = CallContext::new();
        let value = ctx.run(async { Ok::<_, AuthError>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn already_cancelled_context_short_circuits() {
        let ctx = CallContext::new();
        ctx.cancellation().cancel();
        let result = ctx.run(async { Ok::<_, AuthError>(1) }).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_operation() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());

        let handle = tokio::spawn(async move {
            ctx.run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, AuthError>(())
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_operation() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, AuthError>(())
            })
            .await;
        assert!(matches!(result, Err(AuthError::DeadlineExceeded)));
    }

    #[test]
    fn earliest_deadline_wins() {
        let now = Instant::now();
        let ctx = CallContext::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }
}
