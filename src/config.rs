//! Startup configuration.
//!
//! Read once in `main` and passed down; nothing reads the environment after
//! startup. Layers, lowest first:
//!
//! 1. built-in defaults
//! 2. an optional `configuration.*` file: server keys at the top level,
//!    database keys under a `[database]` table
//! 3. `AUTH_*` variables for the server, and the `DB_*` variables the auth
//!    service has always used for the database
//!
//! A `.env` file is honoured when present.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config as Cfg, Environment, File, Map, Source, Value};
use secrecy::SecretString;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

const APP_PREFIX: &str = "AUTH";
const DB_PREFIX: &str = "DB";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub readiness_timeout_ms: u64,
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_json: bool,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: SecretString,
    #[serde(default = "default_db_name")]
    pub name: String,
}

#[derive(Deserialize)]
struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    listen_addr: SocketAddr,
    #[serde(default = "default_readiness_timeout_ms")]
    readiness_timeout_ms: u64,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_json: bool,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_readiness_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_db_host() -> String {
    "localhost".to_owned()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_owned()
}

fn default_db_password() -> SecretString {
    SecretString::new(String::new())
}

fn default_db_name() -> String {
    "postgres".to_owned()
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenvy::dotenv().ok();
        Self::from_sources(File::with_name("configuration").required(false), None, None)
    }

    /// `None` for an env map means the process environment.
    fn from_sources(
        file: impl Source + Send + Sync + 'static,
        app_env: Option<Map<String, String>>,
        db_env: Option<Map<String, String>>,
    ) -> Result<Self, Error> {
        let mut file: Map<String, Value> = Cfg::builder().add_source(file).build()?.try_deserialize()?;
        let database_file = match file.remove("database") {
            Some(table) => table.into_table()?,
            None => Map::new(),
        };

        let server: ServerSettings = layered(
            file,
            Environment::with_prefix(APP_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(app_env),
        )?;
        let database: DatabaseConfig = layered(
            database_file,
            Environment::with_prefix(DB_PREFIX).try_parsing(true).source(db_env),
        )?;

        Ok(Self {
            listen_addr: server.listen_addr,
            readiness_timeout_ms: server.readiness_timeout_ms,
            log_level: server.log_level,
            log_json: server.log_json,
            database,
        })
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

/// File values as defaults, environment on top.
fn layered<T: DeserializeOwned>(file: Map<String, Value>, env: Environment) -> Result<T, Error> {
    let mut builder = Cfg::builder();
    for (key, value) in file {
        builder = builder.set_default(key, value)?;
    }
    Ok(builder.add_source(env).build()?.try_deserialize()?)
}
