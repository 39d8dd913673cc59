//! Startup error type.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that stop the process from starting.
///
/// A failing dependency is not one of them: readiness failures are
/// [`CheckError`](crate::CheckError)s and end up as `500` responses, while
/// the server keeps running.
#[derive(Debug, Error)]
pub enum Error {
    /// The listener could not be created.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
}
