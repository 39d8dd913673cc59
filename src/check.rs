//! Dependency checks that gate readiness.
//!
//! A [`DependencyCheck`] answers one question: is the thing this service
//! needs in order to serve traffic reachable right now? The server calls it
//! on every `/readyz` request and turns the answer into `200` or `500`.
//!
//! Any async closure returning `Result<(), CheckError>` is a check:
//!
//! ```rust
//! use auth_probe::{CheckError, HealthServer};
//!
//! let server = HealthServer::new(|| async {
//!     if cache_is_warm() {
//!         Ok(())
//!     } else {
//!         Err(CheckError::unavailable("cache not warm"))
//!     }
//! });
//! # fn cache_is_warm() -> bool { true }
//! ```
//!
//! Types that own a client (a connection pool, an RPC channel) implement the
//! trait directly. See `PgCheck` for the PostgreSQL one.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Boxed future returned by [`DependencyCheck::check`].
///
/// `Send + 'static` so the readiness handler can await it from any worker
/// thread without borrowing the check.
pub type CheckFuture = Pin<Box<dyn Future<Output = Result<(), CheckError>> + Send + 'static>>;

/// Why a dependency check failed. `Display` is the body sent to the prober.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The check ran and reported the dependency as unusable.
    #[error("{reason}")]
    Unavailable { reason: Cow<'static, str> },

    /// The check did not finish within the readiness timeout.
    #[error("dependency check timed out after {0:?}")]
    TimedOut(Duration),
}

impl CheckError {
    pub fn unavailable(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }
}

/// A zero-argument probe of an external dependency.
///
/// Called concurrently from every in-flight readiness request, so it takes
/// `&self`. Implementations must not keep per-call state; anything they hold
/// (pools, clients) is shared and read-only from the check's point of view.
pub trait DependencyCheck: Send + Sync + 'static {
    fn check(&self) -> CheckFuture;
}

impl<F, Fut> DependencyCheck for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
{
    fn check(&self) -> CheckFuture {
        Box::pin((self)())
    }
}

/// Runs `check`, giving up after `timeout`.
pub async fn run_bounded(check: &dyn DependencyCheck, timeout: Duration) -> Result<(), CheckError> {
    match tokio::time::timeout(timeout, check.check()).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(CheckError::TimedOut(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn closure_is_a_check() {
        let ok = || async { Ok::<_, CheckError>(()) };
        let down = || async { Err::<(), _>(CheckError::unavailable("db not ready")) };

        assert!(ok.check().await.is_ok());
        let err = down.check().await.unwrap_err();
        assert_eq!(err.to_string(), "db not ready");
    }

    #[tokio::test]
    async fn each_run_invokes_the_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let check = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CheckError>(()) }
        };

        for _ in 0..3 {
            run_bounded(&check, Duration::from_secs(1)).await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_check_times_out() {
        let hung = || std::future::pending::<Result<(), CheckError>>();

        let err = run_bounded(&hung, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, CheckError::TimedOut(d) if d == Duration::from_secs(2)));
        assert_eq!(err.to_string(), "dependency check timed out after 2s");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_check_within_budget_succeeds() {
        let slow = || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, CheckError>(())
        };

        assert!(run_bounded(&slow, Duration::from_secs(2)).await.is_ok());
    }
}
