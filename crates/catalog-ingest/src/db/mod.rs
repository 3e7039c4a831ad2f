//! PostgreSQL connection setup
//!
//! The loader is strictly sequential, so the pool is capped at a single
//! connection: every statement of a run goes through the same session.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

pub mod constraints;

pub use constraints::{with_foreign_key_checks_disabled, ForeignKeyChecks};

/// Default PostgreSQL port when `DATABASE_HOST` carries none.
pub const DEFAULT_DATABASE_PORT: u16 = 5432;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_HOST and connection settings.")]
    Config(String),
}

impl DbError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// SQLSTATE reported by the server, if any
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db)) => db.code().map(|c| c.into_owned()),
            _ => None,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Target database; called "schema" in the loader's settings
    pub database: String,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    /// Split a `host` or `host:port` setting into its parts
    pub fn parse_host(raw: &str) -> DbResult<(String, u16)> {
        let raw = raw.trim();
        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port
                    .parse()
                    .map_err(|_| DbError::config(format!("invalid port in DATABASE_HOST: '{}'", raw)))?;
                Ok((host.to_string(), port))
            },
            _ if raw.is_empty() => Err(DbError::config("DATABASE_HOST is empty")),
            _ => Ok((raw.to_string(), DEFAULT_DATABASE_PORT)),
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Open the single-connection pool used for a loader run
pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(config.connect_options())
        .await?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "Database connection established"
    );

    Ok(pool)
}
