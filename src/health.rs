//! Kubernetes liveness and readiness probes.
//!
//! | Probe | Path | Question | Depends on |
//! |---|---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. | nothing |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from the load balancer. | the [`DependencyCheck`] |
//!
//! Liveness never looks at dependencies: a degraded database must take the
//! pod out of rotation, not restart it.
//!
//! ```rust,no_run
//! use auth_probe::{CheckError, HealthServer};
//!
//! # async fn run() -> Result<(), auth_probe::Error> {
//! HealthServer::new(|| async { Ok::<_, CheckError>(()) })
//!     .start("0.0.0.0:8080".parse().unwrap())
//!     .await
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use crate::check::{self, DependencyCheck};
use crate::error::Error;
use crate::handler::{Handler, ResponseFuture};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::server::Server;

pub const LIVENESS_PATH: &str = "/healthz";
pub const READINESS_PATH: &str = "/readyz";

/// How long a readiness request waits for the dependency check.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Liveness probe handler. Always `200 OK` with body `OK`.
pub async fn liveness(_req: Request) -> Response {
    Response::text("OK")
}

/// The readiness probe: a dependency check bounded by a timeout, served as a
/// route handler. Cheap to clone; every clone shares the same check.
#[derive(Clone)]
pub struct Readiness {
    check: Arc<dyn DependencyCheck>,
    timeout: Duration,
}

impl Readiness {
    pub fn new(check: impl DependencyCheck, timeout: Duration) -> Self {
        Self { check: Arc::new(check), timeout }
    }

    /// Answers one readiness probe. Runs the check every time; results are
    /// never cached.
    pub async fn respond(&self) -> Response {
        match check::run_bounded(self.check.as_ref(), self.timeout).await {
            Ok(()) => Response::text("OK"),
            Err(e) => {
                warn!(error = %e, "readiness check failed");
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .text(e.to_string())
            }
        }
    }
}

impl Handler for Readiness {
    fn call(&self, _req: Request) -> ResponseFuture {
        let readiness = self.clone();
        Box::pin(async move { readiness.respond().await })
    }
}

/// Liveness and readiness endpoints on one listener, with readiness gated on
/// an injected [`DependencyCheck`].
pub struct HealthServer {
    readiness: Readiness,
    router: Router,
}

impl HealthServer {
    /// A server whose readiness waits at most [`DEFAULT_READINESS_TIMEOUT`]
    /// for `check`.
    pub fn new(check: impl DependencyCheck) -> Self {
        Self::with_timeout(check, DEFAULT_READINESS_TIMEOUT)
    }

    pub fn with_timeout(check: impl DependencyCheck, timeout: Duration) -> Self {
        Self { readiness: Readiness::new(check, timeout), router: Router::new() }
    }

    /// Mounts an extra `GET` route next to the probes.
    ///
    /// # Panics
    ///
    /// Panics when `path` is invalid, or (in [`into_router`](Self::into_router))
    /// when it collides with a probe path.
    pub fn route(mut self, path: &str, handler: impl Handler) -> Self {
        self.router = self.router.get(path, handler);
        self
    }

    /// The full routing table: extra routes plus both probes.
    pub fn into_router(self) -> Router {
        self.router
            .get(LIVENESS_PATH, liveness)
            .get(READINESS_PATH, self.readiness)
    }

    /// Binds `addr` and serves until SIGTERM or Ctrl-C.
    ///
    /// Returns [`Error::Bind`] without serving anything if the address is
    /// unavailable.
    pub async fn start(self, addr: SocketAddr) -> Result<(), Error> {
        let server = Server::bind(addr).await?;
        server.serve(self.into_router()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use http::Method;

    use super::*;
    use crate::check::CheckError;
    use crate::router::Lookup;

    async fn get(router: &Router, path: &str) -> Response {
        match router.lookup(&Method::GET, path) {
            Lookup::Found(handler) => handler.call(Request::fake(Method::GET, path)).await,
            _ => panic!("no GET route for {path}"),
        }
    }

    fn toggle(up: &Arc<AtomicBool>) -> impl DependencyCheck {
        let up = Arc::clone(up);
        move || {
            let ready = up.load(Ordering::SeqCst);
            async move {
                if ready { Ok(()) } else { Err(CheckError::unavailable("db not ready")) }
            }
        }
    }

    #[tokio::test]
    async fn liveness_ignores_failing_dependency() {
        let router = HealthServer::new(|| async {
            Err::<(), _>(CheckError::unavailable("db not ready"))
        })
        .into_router();

        let res = get(&router, LIVENESS_PATH).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"OK");
    }

    #[tokio::test]
    async fn readiness_follows_the_check() {
        let up = Arc::new(AtomicBool::new(true));
        let router = HealthServer::new(toggle(&up)).into_router();

        let res = get(&router, READINESS_PATH).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"OK");

        up.store(false, Ordering::SeqCst);
        let res = get(&router, READINESS_PATH).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), b"db not ready");

        up.store(true, Ordering::SeqCst);
        assert_eq!(get(&router, READINESS_PATH).await.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn every_readiness_probe_runs_the_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = HealthServer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CheckError>(()) }
        })
        .into_router();

        for _ in 0..5 {
            get(&router, READINESS_PATH).await;
        }
        get(&router, LIVENESS_PATH).await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_dependency_fails_readiness_after_timeout() {
        let readiness = Readiness::new(
            || std::future::pending::<Result<(), CheckError>>(),
            Duration::from_millis(250),
        );

        let res = readiness.respond().await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), b"dependency check timed out after 250ms");
    }

    #[tokio::test]
    async fn extra_routes_share_the_listener() {
        let router = HealthServer::new(|| async { Ok::<_, CheckError>(()) })
            .route("/", |_req: Request| async { "Hello at Auth!" })
            .into_router();

        assert_eq!(get(&router, "/").await.body(), b"Hello at Auth!");
        assert_eq!(get(&router, LIVENESS_PATH).await.status_code(), StatusCode::OK);
    }

    #[test]
    #[should_panic(expected = "invalid route `/healthz`")]
    fn route_cannot_shadow_a_probe() {
        let _ = HealthServer::new(|| async { Ok::<_, CheckError>(()) })
            .route(LIVENESS_PATH, liveness)
            .into_router();
    }
}
