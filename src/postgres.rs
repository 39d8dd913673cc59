//! PostgreSQL readiness check.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::{info, instrument, warn};

use crate::check::{CheckError, CheckFuture, DependencyCheck};
use crate::config::DatabaseConfig;

/// Pings PostgreSQL through a small lazily-connected pool.
///
/// Construction never touches the network; the first connection is opened by
/// the first check.
#[derive(Clone)]
pub struct PgCheck {
    pool: PgPool,
}

impl PgCheck {
    pub fn connect_lazy(config: &DatabaseConfig, acquire_timeout: Duration) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "configuring PostgreSQL readiness check"
        );

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .min_connections(0)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(connect_options(config));

        Self { pool }
    }

    #[instrument(skip(pool))]
    async fn ping(pool: PgPool) -> Result<(), CheckError> {
        let mut conn = pool.acquire().await.map_err(|e| {
            warn!(error = %e, "failed to acquire PostgreSQL connection");
            CheckError::unavailable("db not ready")
        })?;

        conn.ping().await.map_err(|e| {
            warn!(error = %e, "PostgreSQL ping failed");
            CheckError::unavailable("db not ready")
        })
    }
}

impl DependencyCheck for PgCheck {
    fn check(&self) -> CheckFuture {
        Box::pin(Self::ping(self.pool.clone()))
    }
}

/// Connection options for `config`. TLS is off, as the service has always run
/// next to its database inside the cluster network.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(config.password.expose_secret())
        .database(&config.name)
        .ssl_mode(PgSslMode::Disable)
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn database() -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_owned(),
            port: 6543,
            user: "auth".to_owned(),
            password: SecretString::new("hunter2".to_owned()),
            name: "auth".to_owned(),
        }
    }

    #[test]
    fn options_follow_config() {
        let opts = connect_options(&database());

        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_username(), "auth");
        assert_eq!(opts.get_database(), Some("auth"));
    }

    #[tokio::test]
    async fn unreachable_database_is_not_ready() {
        let mut config = database();
        config.host = "127.0.0.1".to_owned();
        config.port = 1;
        let check = PgCheck::connect_lazy(&config, Duration::from_millis(500));

        let err = check.check().await.unwrap_err();
        assert_eq!(err.to_string(), "db not ready");
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL (DB_HOST, DB_USER, ...)
    async fn live_database_is_ready() {
        let config = crate::Config::load().expect("config");
        let check = PgCheck::connect_lazy(&config.database, config.readiness_timeout());

        check.check().await.expect("database should answer ping");
    }
}
