//! Catalogue Ingest Library
//!
//! Loads the streaming-title CSV export from S3-compatible storage into
//! PostgreSQL and normalizes its comma-separated columns into entity and
//! junction tables.
//!
//! # Stages
//!
//! 1. **Fetch**: read the export via a [`source::CsvSource`]
//! 2. **Parse**: decode rows into [`models::StagingRecord`]s
//! 3. **Reset**: drop and recreate every table ([`schema::reset`])
//! 4. **Load**: fill the staging, title, entity and junction tables
//!    ([`load::CatalogLoader`])
//!
//! # Example
//!
//! ```no_run
//! use catalog_ingest::{config::Config, pipeline::Pipeline, source::S3Source};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let source = S3Source::new(config.storage.clone(), config.object_key.clone());
//!     let summary = Pipeline::new(Box::new(source), config.database).run().await?;
//!     println!("loaded {} titles", summary.titles);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod catalog;
pub mod config;
pub mod dates;
pub mod db;
pub mod junctions;
pub mod load;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod storage;
