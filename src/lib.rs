//! # auth-probe
//!
//! Liveness and readiness probes for the auth service, with readiness gated
//! on a pluggable dependency check.
//!
//! - `GET /healthz`: `200 OK` whenever the process can answer HTTP at all.
//! - `GET /readyz`: `200 OK` if the [`DependencyCheck`] passes, otherwise
//!   `500` with a short plain-text reason.
//!
//! The check runs on every readiness request, bounded by a timeout, and is
//! never consulted for liveness.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use auth_probe::{CheckError, HealthServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), auth_probe::Error> {
//!     HealthServer::new(|| async {
//!         if upstream_reachable().await {
//!             Ok(())
//!         } else {
//!             Err(CheckError::unavailable("upstream not ready"))
//!         }
//!     })
//!     .start("0.0.0.0:8080".parse().unwrap())
//!     .await
//! }
//!
//! async fn upstream_reachable() -> bool { true }
//! ```

mod check;
mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod health;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use check::{CheckError, CheckFuture, DependencyCheck, run_bounded};
pub use crate::config::{Config, DatabaseConfig};
pub use error::Error;
pub use handler::{Handler, ResponseFuture};
pub use health::{HealthServer, Readiness};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
