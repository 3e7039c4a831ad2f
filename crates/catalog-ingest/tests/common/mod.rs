//! Container helpers for catalogue loader integration tests
//!
//! Each test starts its own PostgreSQL and, where needed, MinIO container.
//! Docker must be running; the tests using these helpers are `#[ignore]`d
//! and run with `cargo test -- --ignored`.

#![allow(dead_code)]

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use catalog_ingest::db::DbConfig;
use catalog_ingest::storage::config::StorageConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

pub const DEFAULT_TEST_BUCKET: &str = "catalog-test-data";

pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";

/// Path of a file under `tests/fixtures`
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    db_config: DbConfig,
}

impl TestPostgres {
    /// Start an empty PostgreSQL 16 container
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let db_config = DbConfig {
            host: host.to_string(),
            port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            connect_timeout_secs: 30,
        };
        debug!("PostgreSQL at {}:{}", db_config.host, db_config.port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(db_config.connect_options())
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            container,
            pool,
            db_config,
        })
    }

    /// Pool for assertions; separate from the loader's own connection
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Settings pointing the loader at this container
    pub fn db_config(&self) -> DbConfig {
        self.db_config.clone()
    }

    pub async fn count(&self, table: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", table))?;
        Ok(count)
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query information_schema")?;
        Ok(exists)
    }
}

// ============================================================================
// MinIO Test Container
// ============================================================================

pub struct TestMinio {
    container: ContainerAsync<GenericImage>,
    client: S3Client,
    endpoint: String,
    bucket: String,
}

impl TestMinio {
    /// Start MinIO with [`DEFAULT_TEST_BUCKET`] created
    pub async fn start() -> Result<Self> {
        info!("Starting MinIO test container...");

        let container = GenericImage::new("minio/minio", "latest")
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("MinIO Object Storage Server"))
            .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
            .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .context("Failed to start MinIO container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get MinIO host")?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .context("Failed to get MinIO port")?;

        let endpoint = format!("http://{}:{}", host, port);
        debug!("MinIO endpoint: {}", endpoint);

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_credential_types::Credentials::new(
                MINIO_ACCESS_KEY,
                MINIO_SECRET_KEY,
                None,
                None,
                "static",
            ))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        let client = S3Client::from_conf(s3_config);

        client
            .create_bucket()
            .bucket(DEFAULT_TEST_BUCKET)
            .send()
            .await
            .context("Failed to create S3 bucket")?;

        Ok(Self {
            container,
            client,
            endpoint,
            bucket: DEFAULT_TEST_BUCKET.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Loader storage settings for this container
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::for_minio(&self.endpoint, &self.bucket)
    }

    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.into())
            .send()
            .await
            .context("Failed to upload to S3")?;
        Ok(())
    }
}
