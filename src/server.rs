//! HTTP server and graceful shutdown.
//!
//! Kubernetes stops a pod by sending **SIGTERM** and waiting
//! `terminationGracePeriodSeconds` before SIGKILL. On the signal the server
//! stops accepting, lets every in-flight connection finish, then returns
//! from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Lookup, Router};

/// A bound HTTP listener.
///
/// Binding and serving are separate steps so a bad address fails before
/// anything is served, and so callers binding port `0` can learn the real
/// address from [`local_addr`](Server::local_addr).
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Server {
    /// Binds a TCP listener on `addr`.
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), auth_probe::Error> {
    /// use auth_probe::{Router, Server};
    ///
    /// let server = Server::bind("0.0.0.0:8080".parse().unwrap()).await?;
    /// server.serve(Router::new()).await;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr, source })?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `router` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, router: Router) {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves `router` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown<S>(self, router: Router, signal: S)
    where
        S: Future<Output = ()>,
    {
        let Self { listener, addr } = self;
        let router = Arc::new(router);
        let builder = ConnBuilder::new(TokioExecutor::new());
        // Tells every watched connection to finish its current request and
        // close, which is what ends idle keep-alive connections.
        let graceful = GracefulShutdown::new();

        info!(%addr, "listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown first: once signalled, queued connections are not
                // accepted.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        async move { dispatch(&router, req, peer).await }
                    });
                    let conn = graceful.watch(
                        builder.serve_connection(TokioIo::new(stream), svc).into_owned(),
                    );

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections so the set does not grow forever.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("stopped");
    }
}

/// Routes one request and produces one response. Every failure becomes a
/// status code, so hyper never sees an error.
async fn dispatch(
    router: &Router,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let (parts, _body) = req.into_parts();
    let request = Request::new(parts, peer);
    let method = request.method().clone();
    let path = request.path().to_owned();
    let peer = request.peer();

    let response = match router.lookup(&method, &path) {
        Lookup::Found(handler) => handler.call(request).await,
        Lookup::MethodNotAllowed => Response::status(StatusCode::METHOD_NOT_ALLOWED),
        Lookup::NotFound => Response::status(StatusCode::NOT_FOUND),
    };

    debug!(
        %method,
        %path,
        %peer,
        status = response.status_code().as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "request"
    );

    Ok(response.into_inner())
}

/// Resolves on the first SIGTERM or SIGINT. If a handler cannot be
/// installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
