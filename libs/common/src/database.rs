//! Database module for handling PostgreSQL connections and operations
//!
//! Every call opens one connection, runs one parameterized statement and
//! closes the connection again before returning, whatever the outcome.
//! There is no pool: a connection never outlives the operation that
//! acquired it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, PgSslMode, Postgres};
use sqlx::query::Query;
use sqlx::{Connection, Decode, Row, Type};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseResult, InfrastructureError};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable selecting the deployment mode
pub const DEPLOYMENT_MODE_VAR: &str = "APP_ENV";

/// Deployment mode of the running process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeploymentMode {
    #[default]
    Development,
    Production,
}

impl DeploymentMode {
    /// Read the mode from `APP_ENV`; only `production` selects production
    pub fn from_env() -> Self {
        Self::parse(std::env::var(DEPLOYMENT_MODE_VAR).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => DeploymentMode::Production,
            _ => DeploymentMode::Development,
        }
    }
}

/// Transport security used for the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disabled,
    /// Encrypted, server certificate not pinned
    Required,
    /// Encrypted and verified against the configured CA
    VerifyCa,
}

/// Database configuration struct
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub password: String,
    /// PEM encoded CA certificate
    pub ca: Option<String>,
    pub mode: DeploymentMode,
    /// Upper bound for connect and for execute, in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &"<redacted>")
            .field("ca", &self.ca.as_ref().map(|_| "<pem>"))
            .field("mode", &self.mode)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `POSTGRES_HOST`: server host (default: "localhost")
    /// - `POSTGRES_PORT`: server port (default: 5432)
    /// - `POSTGRES_USER`, `POSTGRES_DB`, `POSTGRES_PASSWORD`: required
    /// - `POSTGRES_CA`: optional PEM certificate, enables verified TLS
    /// - `POSTGRES_TIMEOUT`: connect/execute timeout in seconds (default: 30)
    /// - `APP_ENV`: `production` forces TLS
    pub fn from_env() -> DatabaseResult<Self> {
        let source = Config::builder()
            .add_source(Environment::with_prefix("POSTGRES"))
            .build()
            .map_err(config_error)?;

        Self::from_source(&source, DeploymentMode::from_env())
    }

    /// Build the configuration from an already assembled `config` source.
    /// Keys are the lowercase variable names without the `POSTGRES_` prefix.
    pub fn from_source(source: &Config, mode: DeploymentMode) -> DatabaseResult<Self> {
        let host = optional_string(source, "host")?.unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match optional_int(source, "port")? {
            Some(port) => u16::try_from(port).map_err(|_| {
                InfrastructureError::Configuration(format!("POSTGRES_PORT out of range: {port}"))
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match optional_int(source, "timeout")? {
            Some(secs) => u64::try_from(secs).map_err(|_| {
                InfrastructureError::Configuration(format!("POSTGRES_TIMEOUT must be positive: {secs}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let ca = optional_string(source, "ca")?.filter(|pem| !pem.trim().is_empty());

        Ok(Self {
            host,
            port,
            user: required_string(source, "user")?,
            database: required_string(source, "db")?,
            password: required_string(source, "password")?,
            ca,
            mode,
            timeout_secs,
        })
    }

    /// TLS is verified when a CA is configured, required in production,
    /// and disabled otherwise.
    pub fn tls_mode(&self) -> TlsMode {
        match (&self.ca, self.mode) {
            (Some(_), _) => TlsMode::VerifyCa,
            (None, DeploymentMode::Production) => TlsMode::Required,
            (None, DeploymentMode::Development) => TlsMode::Disabled,
        }
    }

    /// Driver options for a single connection
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database);

        match (self.tls_mode(), &self.ca) {
            (TlsMode::VerifyCa, Some(ca)) => options
                .ssl_mode(PgSslMode::VerifyCa)
                .ssl_root_cert_from_pem(ca.clone().into_bytes()),
            (TlsMode::Disabled, _) => options.ssl_mode(PgSslMode::Disable),
            _ => options.ssl_mode(PgSslMode::Require),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn config_error(err: ConfigError) -> InfrastructureError {
    InfrastructureError::Configuration(err.to_string())
}

fn optional_string(source: &Config, key: &str) -> DatabaseResult<Option<String>> {
    match source.get_string(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_error(e)),
    }
}

fn optional_int(source: &Config, key: &str) -> DatabaseResult<Option<i64>> {
    match source.get_int(key) {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_error(e)),
    }
}

fn required_string(source: &Config, key: &str) -> DatabaseResult<String> {
    optional_string(source, key)?.ok_or_else(|| {
        InfrastructureError::Configuration(format!(
            "POSTGRES_{} environment variable not set",
            key.to_uppercase()
        ))
    })
}

/// A value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<Uuid> for Param {
    fn from(value: Uuid) -> Self {
        Param::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(value: DateTime<Utc>) -> Self {
        Param::Timestamp(value)
    }
}

/// Statement text plus its ordered bind parameters.
///
/// Values are always sent to the server separately from the text; they are
/// never interpolated into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: Vec<Param>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Append the value for the next `$n` placeholder
    pub fn bind(mut self, value: impl Into<Param>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    fn to_query(&self) -> Query<'_, Postgres, PgArguments> {
        self.params
            .iter()
            .fold(sqlx::query(&self.text), |query, param| match param {
                Param::Text(value) => query.bind(value.as_str()),
                Param::Int(value) => query.bind(*value),
                Param::Uuid(value) => query.bind(*value),
                Param::Timestamp(value) => query.bind(*value),
            })
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Statement::new(text)
    }
}

/// Rows returned by a statement, in server order
#[derive(Debug)]
pub struct QueryResult {
    pub rows: Vec<PgRow>,
    pub row_count: u64,
}

impl QueryResult {
    pub fn first(&self) -> Option<&PgRow> {
        self.rows.first()
    }

    /// Decode one column of the first row
    pub fn scalar<T>(&self, column: &str) -> DatabaseResult<T>
    where
        T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
    {
        let row = self.first().ok_or_else(|| {
            InfrastructureError::Decode(format!("no row returned for column {column}"))
        })?;

        row.try_get::<T, _>(column)
            .map_err(|e| InfrastructureError::Decode(e.to_string()))
    }
}

/// Connection manager: one scoped connection per statement
#[derive(Debug, Clone)]
pub struct Database {
    config: Arc<DatabaseConfig>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Name of the configured database
    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    /// Open a connection the caller is responsible for closing.
    ///
    /// Prefer [`Database::query`]; this exists for work that needs a raw
    /// connection, such as running migrations.
    pub async fn connect(&self) -> DatabaseResult<PgConnection> {
        let options = self.config.connect_options();
        let conn = self
            .bounded(PgConnection::connect_with(&options))
            .await?
            .map_err(InfrastructureError::Connection)?;

        debug!(
            host = %self.config.host,
            database = %self.config.database,
            tls = ?self.config.tls_mode(),
            "Database connection opened"
        );
        Ok(conn)
    }

    /// Close a connection obtained from [`Database::connect`].
    /// Failures to close are logged, never returned.
    pub async fn release(&self, conn: PgConnection) {
        match conn.close().await {
            Ok(()) => debug!("Database connection closed"),
            Err(e) => warn!(error = %e, "Failed to close database connection cleanly"),
        }
    }

    /// Execute a statement on a fresh connection and close it afterwards
    pub async fn query(&self, statement: impl Into<Statement>) -> DatabaseResult<QueryResult> {
        let statement = statement.into();
        let mut conn = self.connect().await.inspect_err(|e| {
            error!(error = %e, "Database connection failed");
        })?;

        let outcome = self.execute(&mut conn, &statement).await;
        self.release(conn).await;

        match &outcome {
            Ok(result) => debug!(rows = result.row_count, "Statement executed"),
            Err(e) => error!(error = %e, statement = statement.text(), "Statement failed"),
        }
        outcome
    }

    async fn execute(
        &self,
        conn: &mut PgConnection,
        statement: &Statement,
    ) -> DatabaseResult<QueryResult> {
        let rows = self
            .bounded(statement.to_query().fetch_all(conn))
            .await?
            .map_err(InfrastructureError::Query)?;

        let row_count = rows.len() as u64;
        Ok(QueryResult { rows, row_count })
    }

    async fn bounded<F: Future>(&self, fut: F) -> DatabaseResult<F::Output> {
        tokio::time::timeout(self.config.timeout(), fut)
            .await
            .map_err(|_| InfrastructureError::Timeout(self.config.timeout_secs))
    }

    /// Version string exactly as the server reports it
    pub async fn server_version(&self) -> DatabaseResult<String> {
        self.query("SHOW server_version;")
            .await?
            .scalar("server_version")
    }

    /// Configured connection limit; the server reports it as text
    pub async fn max_connections(&self) -> DatabaseResult<String> {
        self.query("SHOW max_connections;")
            .await?
            .scalar("max_connections")
    }

    /// Active sessions on one database
    pub async fn open_connections(&self, database_name: &str) -> DatabaseResult<i32> {
        let statement =
            Statement::new("SELECT COUNT(*)::int AS count FROM pg_stat_activity WHERE datname = $1;")
                .bind(database_name);

        self.query(statement).await?.scalar("count")
    }

    /// Check database connectivity
    pub async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.query("SELECT 1 AS result;").await?;
        let healthy = result.scalar::<i32>("result")? == 1;
        info!(healthy, "Database health check finished");
        Ok(healthy)
    }
}
