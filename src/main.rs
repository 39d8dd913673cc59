//! Auth service probe server.
//!
//! Verifies the database once at startup, then serves `/healthz`, `/readyz`
//! (gated on a PostgreSQL ping) and the greeting at `/`.
//!
//! ```text
//! DB_HOST=localhost DB_USER=postgres DB_PASSWORD=secret DB_NAME=auth \
//!     RUST_LOG=info cargo run
//! curl -i http://localhost:8080/readyz
//! ```

use std::process::ExitCode;

use auth_probe::postgres::PgCheck;
use auth_probe::{Config, HealthServer, Request, run_bounded};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("auth-probe: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    let check = PgCheck::connect_lazy(&config.database, config.readiness_timeout());

    // Refuse to start without a database, like the service always has.
    if let Err(e) = run_bounded(&check, config.readiness_timeout()).await {
        error!(error = %e, "database unreachable at startup");
        return ExitCode::FAILURE;
    }
    info!("connected to database");

    let server = HealthServer::with_timeout(check, config.readiness_timeout())
        .route("/", hello);

    match server.start(config.listen_addr).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn hello(_req: Request) -> &'static str {
    "Hello at Auth!"
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
