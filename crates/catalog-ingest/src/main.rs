//! Catalogue Ingest - load the title export into PostgreSQL

use anyhow::{Context, Result};
use catalog_common::logging::{init_logging, LogConfig, LogLevel};
use catalog_ingest::{
    catalog::{search_titles, CatalogTitle},
    config::{database_from_env, Config},
    db::create_pool,
    pipeline::{reset_schema, Pipeline},
    source::{CsvSource, LocalFileSource, S3Source},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "catalog-ingest")]
#[command(author, version, about = "Title catalogue loader")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the export, reset the schema and load every table
    Load {
        /// Read the export from a local file instead of S3
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Drop and recreate the schema without loading
    Reset,

    /// List loaded titles with their directors, countries and categories
    Search {
        /// Case-insensitive substring of the title
        #[arg(short, long)]
        query: Option<String>,

        /// Print JSON instead of one line per title
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("catalog-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Load { file } => {
            let (source, database) = match file {
                Some(path) => {
                    let source: Box<dyn CsvSource> = Box::new(LocalFileSource::new(path));
                    (source, database_from_env()?)
                },
                None => {
                    let config = Config::from_env()?;
                    let source: Box<dyn CsvSource> =
                        Box::new(S3Source::new(config.storage, config.object_key));
                    (source, config.database)
                },
            };

            info!("Loading catalogue from {}", source.describe());
            Pipeline::new(source, database).run().await?;
        },
        Command::Reset => {
            reset_schema(&database_from_env()?).await?;
        },
        Command::Search { query, json } => {
            let database = database_from_env()?;
            let pool = create_pool(&database)
                .await
                .context("Failed to connect to the catalogue database")?;
            let titles = search_titles(&pool, query.as_deref()).await?;
            pool.close().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&titles)?);
            } else {
                for title in &titles {
                    println!("{}", render_line(title));
                }
            }
            info!(count = titles.len(), "Search complete");
        },
    }

    Ok(())
}

fn render_line(title: &CatalogTitle) -> String {
    let year = title
        .release_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{}\t{}\t{}\tdirectors: {}\tcountries: {}\tcategories: {}",
        title.show_id,
        title.title,
        title.kind.as_deref().unwrap_or("-"),
        year,
        title.directors.join(", "),
        title.countries.join(", "),
        title.categories.join(", "),
    )
}
