//! Loader configuration
//!
//! Everything a run needs is read once, validated, and passed into each stage.
//! Required settings:
//!
//! | Variable            | Meaning                                      |
//! |---------------------|----------------------------------------------|
//! | `S3_ACCESS_KEY`     | storage access key (or `S3_ACCES_KEY`, `AWS_ACCESS_KEY_ID`) |
//! | `S3_SECRET_KEY`     | storage secret (or `AWS_SECRET_ACCESS_KEY`)  |
//! | `S3_BUCKET_NAME`    | bucket holding the export                    |
//! | `S3_FILE_KEY`       | object key of the export                     |
//! | `DATABASE_HOST`     | `host` or `host:port`                        |
//! | `DATABASE_USER`     | database user                                |
//! | `DATABASE_PASSWORD` | database password                            |
//! | `DATABASE_SCHEMA`   | database to load into                        |
//!
//! Optional: `S3_REGION`, `S3_ENDPOINT`, `S3_PATH_STYLE`, `DATABASE_PORT`,
//! `DATABASE_CONNECT_TIMEOUT`.

use catalog_common::CatalogError;

use crate::db::{DbConfig, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::storage::config::{StorageConfig, DEFAULT_REGION};

/// Full configuration for a fetch-from-S3 run
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    /// Object key of the CSV export inside `storage.bucket`
    pub object_key: String,
    pub database: DbConfig,
}

struct Settings<F> {
    lookup: F,
    missing: Vec<&'static str>,
}

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Value of the first name that is set; records `names[0]` as missing otherwise
    fn required(&mut self, names: &[&'static str]) -> String {
        match names.iter().find_map(|name| self.optional(name)) {
            Some(value) => value,
            None => {
                self.missing.push(names[0]);
                String::new()
            },
        }
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, CatalogError> {
        self.optional(name)
            .map(|raw| {
                raw.parse()
                    .map_err(|_| CatalogError::Config(format!("{} has an invalid value: '{}'", name, raw)))
            })
            .transpose()
    }

    fn finish(self) -> Result<(), CatalogError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Config(format!(
                "missing required settings: {}",
                self.missing.join(", ")
            )))
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, CatalogError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any name → value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CatalogError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::new(lookup);

        let access_key = settings.required(&["S3_ACCESS_KEY", "S3_ACCES_KEY", "AWS_ACCESS_KEY_ID"]);
        let secret_key = settings.required(&["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]);
        let bucket = settings.required(&["S3_BUCKET_NAME"]);
        let object_key = settings.required(&["S3_FILE_KEY"]);
        let database = database_settings(&mut settings)?;

        let storage = StorageConfig {
            endpoint: settings.optional("S3_ENDPOINT"),
            region: settings
                .optional("S3_REGION")
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket,
            access_key,
            secret_key,
            path_style: settings.parsed("S3_PATH_STYLE")?.unwrap_or(false),
        };

        settings.finish()?;
        let database = database.ok_or_else(|| CatalogError::Config("invalid database settings".into()))?;

        let config = Self {
            storage,
            object_key,
            database,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.object_key.ends_with('/') {
            return Err(CatalogError::Config(format!(
                "S3_FILE_KEY must name an object, got prefix '{}'",
                self.object_key
            )));
        }
        validate_database(&self.database)
    }
}

/// Load only the database settings, for runs that do not touch S3
pub fn database_from_env() -> Result<DbConfig, CatalogError> {
    dotenvy::dotenv().ok();
    database_from_lookup(|name| std::env::var(name).ok())
}

pub fn database_from_lookup<F>(lookup: F) -> Result<DbConfig, CatalogError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::new(lookup);
    let database = database_settings(&mut settings)?;
    settings.finish()?;
    let database = database.ok_or_else(|| CatalogError::Config("invalid database settings".into()))?;
    validate_database(&database)?;
    Ok(database)
}

/// `None` when `DATABASE_HOST` is missing; the caller reports it via `finish`
fn database_settings<F>(settings: &mut Settings<F>) -> Result<Option<DbConfig>, CatalogError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = settings.required(&["DATABASE_HOST"]);
    let user = settings.required(&["DATABASE_USER"]);
    let password = settings.required(&["DATABASE_PASSWORD"]);
    let database = settings.required(&["DATABASE_SCHEMA"]);
    let explicit_port: Option<u16> = settings.parsed("DATABASE_PORT")?;
    let connect_timeout_secs = settings
        .parsed("DATABASE_CONNECT_TIMEOUT")?
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

    if host.is_empty() {
        return Ok(None);
    }

    let (host, port) =
        DbConfig::parse_host(&host).map_err(|e| CatalogError::Config(e.to_string()))?;

    Ok(Some(DbConfig {
        host,
        port: explicit_port.unwrap_or(port),
        user,
        password,
        database,
        connect_timeout_secs,
    }))
}

fn validate_database(config: &DbConfig) -> Result<(), CatalogError> {
    if config.port == 0 {
        return Err(CatalogError::Config("database port must be greater than 0".into()));
    }
    if config.connect_timeout_secs == 0 {
        return Err(CatalogError::Config(
            "DATABASE_CONNECT_TIMEOUT must be greater than 0".into(),
        ));
    }
    Ok(())
}
