//! Process configuration, read once at startup

use std::net::SocketAddr;

use anyhow::{Context, Result};
use common::database::DatabaseConfig;
use config::{Config, ConfigError, Environment};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: i64 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// # Environment Variables
    /// - `APP_HOST`: bind address (default: "0.0.0.0")
    /// - `APP_PORT`: bind port (default: 3000)
    /// - `POSTGRES_*`, `APP_ENV`: see [`DatabaseConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        let source = Config::builder()
            .add_source(Environment::with_prefix("APP"))
            .build()
            .context("read APP_* environment")?;
        let database = DatabaseConfig::from_env().context("read POSTGRES_* environment")?;

        Self::from_source(&source, database)
    }

    pub fn from_source(source: &Config, database: DatabaseConfig) -> Result<Self> {
        let host = match source.get_string("host") {
            Ok(host) => host,
            Err(ConfigError::NotFound(_)) => DEFAULT_HOST.to_string(),
            Err(e) => return Err(e).context("APP_HOST"),
        };
        let port = match source.get_int("port") {
            Ok(port) => port,
            Err(ConfigError::NotFound(_)) => DEFAULT_PORT,
            Err(e) => return Err(e).context("APP_PORT"),
        };

        let listen_addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        Ok(Self {
            listen_addr,
            database,
        })
    }
}
