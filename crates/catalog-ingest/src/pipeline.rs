//! Run orchestration: fetch → parse → reset schema → load
//!
//! Each stage converts its failure into a [`CatalogError`] and logs it once.
//! A failed stage ends the run; nothing after it is attempted.

use catalog_common::{CatalogError, Result};
use sqlx::PgPool;
use tracing::{error, info, instrument};

use crate::db::{create_pool, DbConfig};
use crate::load::{CatalogLoader, LoadSummary};
use crate::models::{parse_csv, Dataset};
use crate::schema;
use crate::source::CsvSource;

/// Full loader run against one source and one database
pub struct Pipeline {
    source: Box<dyn CsvSource>,
    database: DbConfig,
    loader: CatalogLoader,
}

impl Pipeline {
    pub fn new(source: Box<dyn CsvSource>, database: DbConfig) -> Self {
        Self {
            source,
            database,
            loader: CatalogLoader::new(),
        }
    }

    /// Use a loader with non-default batch sizes
    pub fn with_loader(mut self, loader: CatalogLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Run every stage in order
    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub async fn run(&self) -> Result<LoadSummary> {
        info!("Starting catalogue load");

        info!("Step 1/4: Fetching export...");
        let bytes = self.source.fetch().await.map_err(log_failure)?;

        info!("Step 2/4: Parsing {} bytes of CSV...", bytes.len());
        let dataset = parse(&bytes).map_err(log_failure)?;
        drop(bytes);
        dataset.log_preview();

        let pool = connect(&self.database).await.map_err(log_failure)?;
        let result = self.run_database_stages(&pool, &dataset).await;
        pool.close().await;

        let summary = result.map_err(log_failure)?;
        log_summary(&summary);
        Ok(summary)
    }

    async fn run_database_stages(&self, pool: &PgPool, dataset: &Dataset) -> Result<LoadSummary> {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| CatalogError::SchemaReset(format!("failed to acquire connection: {}", e)))?;

        info!("Step 3/4: Resetting schema...");
        schema::reset(&mut conn)
            .await
            .map_err(|e| CatalogError::SchemaReset(e.to_string()))?;

        info!("Step 4/4: Loading {} records...", dataset.len());
        self.loader
            .load(&mut conn, &dataset.records)
            .await
            .map_err(|e| CatalogError::Load(e.to_string()))
    }
}

/// Drop and recreate the schema without loading anything
#[instrument(skip(database), fields(host = %database.host, database = %database.database))]
pub async fn reset_schema(database: &DbConfig) -> Result<()> {
    let pool = connect(database).await.map_err(log_failure)?;

    let result = async {
        let mut conn = pool
            .acquire()
            .await
            .map_err(|e| CatalogError::SchemaReset(format!("failed to acquire connection: {}", e)))?;
        schema::reset(&mut conn)
            .await
            .map_err(|e| CatalogError::SchemaReset(e.to_string()))
    }
    .await;
    pool.close().await;

    result.map_err(log_failure)?;
    info!("Schema reset complete");
    Ok(())
}

fn parse(bytes: &[u8]) -> Result<Dataset> {
    parse_csv(bytes).map_err(|e| CatalogError::Source(format!("failed to parse CSV: {}", e)))
}

async fn connect(database: &DbConfig) -> Result<PgPool> {
    create_pool(database).await.map_err(|e| {
        CatalogError::SchemaReset(format!(
            "could not connect to {}:{}/{}: {}",
            database.host, database.port, database.database, e
        ))
    })
}

fn log_failure(err: CatalogError) -> CatalogError {
    error!(stage = %err.stage(), "{}", err);
    err
}

fn log_summary(summary: &LoadSummary) {
    info!(
        staged = summary.staged,
        titles = summary.titles,
        "Catalogue load completed"
    );
    for field in &summary.fields {
        info!(
            entity_table = field.field.entity_table(),
            entities = field.entities,
            junction_table = field.field.junction_table(),
            links = field.links,
            "Normalized {}",
            field.field
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_common::Stage;

    struct FailingSource;

    #[async_trait]
    impl CsvSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            Err(CatalogError::ObjectNotFound {
                bucket: "catalog".to_string(),
                key: "missing.csv".to_string(),
            })
        }

        fn describe(&self) -> String {
            "s3://catalog/missing.csv".to_string()
        }
    }

    struct StaticSource(&'static [u8]);

    #[async_trait]
    impl CsvSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<u8>> {
            Ok(self.0.to_vec())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    // Port 1 is never listening; any attempt to reach it fails the reset stage.
    fn unreachable_database() -> DbConfig {
        DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "nobody".to_string(),
            password: "nothing".to_string(),
            database: "catalog".to_string(),
            connect_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_before_database() {
        let pipeline = Pipeline::new(Box::new(FailingSource), unreachable_database());
        let err = pipeline.run().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.stage(), Stage::Fetch);
    }

    #[tokio::test]
    async fn test_malformed_csv_fails_before_database() {
        let pipeline = Pipeline::new(
            Box::new(StaticSource(b"show_id,title\ns1,Only two columns\n")),
            unreachable_database(),
        );
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, CatalogError::Source(_)));
    }

    #[tokio::test]
    async fn test_duplicate_show_id_fails_before_database() {
        let pipeline = Pipeline::new(
            Box::new(StaticSource(
                b"show_id,type,title,director,cast,country,date_added,release_year,rating,duration,listed_in,description\n\
s1,Movie,First,,,,,2020,,,,\n\
s1,Movie,Second,,,,,2021,,,,\n",
            )),
            unreachable_database(),
        );
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, CatalogError::Source(ref msg) if msg.contains("s1")));
        assert_eq!(err.stage(), Stage::Fetch);
    }

    #[tokio::test]
    async fn test_unreachable_database_is_schema_reset_failure() {
        let err = reset_schema(&unreachable_database()).await.unwrap_err();
        assert_eq!(err.stage(), Stage::SchemaReset);
    }
}
