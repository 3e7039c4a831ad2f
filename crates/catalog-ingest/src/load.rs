//! Staging and normalized table loading
//!
//! Two transactions per run: the staging table first, then titles, entity
//! tables and junction tables together. Batches go through `QueryBuilder`
//! multi-row inserts to stay under PostgreSQL's bind-parameter limit.

use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Transaction};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::junctions::{normalize_field, JunctionRow, NormalizedField};
use crate::models::StagingRecord;
use crate::normalize::{EntitySet, MultiValueField};
use crate::schema::STAGING_TABLE;

// Batch size constants
pub const DEFAULT_STAGING_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_ENTITY_CHUNK_SIZE: usize = 5000;
pub const DEFAULT_LINK_CHUNK_SIZE: usize = 5000;

pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

/// Row counts for one normalized field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    pub field: MultiValueField,
    pub entities: u64,
    pub links: u64,
}

/// Row counts of a completed load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub staged: u64,
    pub titles: u64,
    pub fields: Vec<FieldSummary>,
}

impl LoadSummary {
    pub fn field(&self, field: MultiValueField) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.field == field)
    }
}

/// Writes a parsed export into the catalogue tables
pub struct CatalogLoader {
    staging_chunk_size: usize,
    entity_chunk_size: usize,
    link_chunk_size: usize,
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogLoader {
    /// Create loader with default chunk sizes
    pub fn new() -> Self {
        Self {
            staging_chunk_size: DEFAULT_STAGING_CHUNK_SIZE,
            entity_chunk_size: DEFAULT_ENTITY_CHUNK_SIZE,
            link_chunk_size: DEFAULT_LINK_CHUNK_SIZE,
        }
    }

    /// Create loader with custom chunk sizes
    pub fn with_chunk_sizes(staging: usize, entity: usize, link: usize) -> Self {
        Self {
            staging_chunk_size: staging.max(1),
            entity_chunk_size: entity.max(1),
            link_chunk_size: link.max(1),
        }
    }

    /// Load staging rows, then derive and load every normalized table
    #[instrument(skip(self, conn, records), fields(records = records.len()))]
    pub async fn load(
        &self,
        conn: &mut PgConnection,
        records: &[StagingRecord],
    ) -> LoadResult<LoadSummary> {
        let staged = self.load_staging(conn, records).await?;
        let mut summary = self.load_normalized(conn, records).await?;
        summary.staged = staged;
        Ok(summary)
    }

    /// Insert the records verbatim into the staging table
    pub async fn load_staging(
        &self,
        conn: &mut PgConnection,
        records: &[StagingRecord],
    ) -> LoadResult<u64> {
        let mut tx = conn.begin().await?;
        let total_chunks = records.len().div_ceil(self.staging_chunk_size);
        let mut stored = 0;

        for (chunk_idx, chunk) in records.chunks(self.staging_chunk_size).enumerate() {
            debug!(
                "Storing staging chunk {} / {} ({} rows)",
                chunk_idx + 1,
                total_chunks,
                chunk.len()
            );
            stored += Self::insert_staging_chunk(&mut tx, chunk).await?;
        }

        tx.commit().await?;
        info!(table = STAGING_TABLE, rows = stored, "Staging table loaded");
        Ok(stored)
    }

    async fn insert_staging_chunk(
        tx: &mut Transaction<'_, Postgres>,
        records: &[StagingRecord],
    ) -> LoadResult<u64> {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            INSERT INTO netflix_titles (
                show_id,
                type,
                title,
                director,
                "cast",
                country,
                date_added,
                release_year,
                rating,
                duration,
                listed_in,
                description
            )
            "#,
        );

        query_builder.push_values(records, |mut b, record| {
            b.push_bind(&record.show_id)
                .push_bind(&record.kind)
                .push_bind(&record.title)
                .push_bind(&record.director)
                .push_bind(&record.cast)
                .push_bind(&record.country)
                .push_bind(record.date_added)
                .push_bind(record.release_year)
                .push_bind(&record.rating)
                .push_bind(&record.duration)
                .push_bind(&record.listed_in)
                .push_bind(&record.description);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    /// Derive titles, entities and junctions in one transaction
    pub async fn load_normalized(
        &self,
        conn: &mut PgConnection,
        records: &[StagingRecord],
    ) -> LoadResult<LoadSummary> {
        let mut tx = conn.begin().await?;

        let titles = sqlx::query(
            r#"
            INSERT INTO titles (
                show_id, title, type, release_year,
                rating, duration, date_added, description
            )
            SELECT
                show_id, title, type, release_year,
                rating, duration, date_added, description
            FROM netflix_titles
            "#,
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();
        info!(table = "titles", rows = titles, "Titles table loaded");

        let mut fields = Vec::with_capacity(MultiValueField::ALL.len());
        for field in MultiValueField::ALL {
            let normalized = normalize_field(records, field);
            fields.push(self.store_field(&mut tx, &normalized).await?);
        }

        tx.commit().await?;
        info!("All normalized tables loaded");

        Ok(LoadSummary {
            staged: 0,
            titles,
            fields,
        })
    }

    async fn store_field(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        normalized: &NormalizedField,
    ) -> LoadResult<FieldSummary> {
        let field = normalized.field;

        let entities = self.store_entities(tx, field, &normalized.entities).await?;
        if entities != normalized.entities.len() as u64 {
            return Err(LoadError::Integrity(format!(
                "{}: inserted {} of {} distinct names",
                field.entity_table(),
                entities,
                normalized.entities.len()
            )));
        }
        info!(table = field.entity_table(), rows = entities, "Entity table loaded");

        let links = self.store_links(tx, field, &normalized.links).await?;
        info!(table = field.junction_table(), rows = links, "Junction table loaded");

        Ok(FieldSummary {
            field,
            entities,
            links,
        })
    }

    async fn store_entities(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        field: MultiValueField,
        entities: &EntitySet,
    ) -> LoadResult<u64> {
        let rows: Vec<(i32, &str)> = entities.iter().collect();
        let mut stored = 0;

        for chunk in rows.chunks(self.entity_chunk_size) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} (id, name) ", field.entity_table()));
            query_builder.push_values(chunk, |mut b, (id, name)| {
                b.push_bind(*id).push_bind(*name);
            });
            query_builder.push(" ON CONFLICT (name) DO NOTHING");

            stored += query_builder.build().execute(&mut **tx).await?.rows_affected();
        }

        // Ids were supplied explicitly; move the identity past them.
        sqlx::query(&format!(
            "SELECT setval(pg_get_serial_sequence('{table}', 'id'), MAX(id)) FROM {table}",
            table = field.entity_table()
        ))
        .execute(&mut **tx)
        .await?;

        Ok(stored)
    }

    async fn store_links(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        field: MultiValueField,
        links: &[JunctionRow],
    ) -> LoadResult<u64> {
        let total_chunks = links.len().div_ceil(self.link_chunk_size);
        let mut stored = 0;

        for (chunk_idx, chunk) in links.chunks(self.link_chunk_size).enumerate() {
            debug!(
                "Storing {} chunk {} / {} ({} rows)",
                field.junction_table(),
                chunk_idx + 1,
                total_chunks,
                chunk.len()
            );

            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} (show_id, {}) ",
                field.junction_table(),
                field.junction_column()
            ));
            query_builder.push_values(chunk, |mut b, link| {
                b.push_bind(&link.show_id).push_bind(link.entity_id);
            });
            query_builder.push(" ON CONFLICT DO NOTHING");

            stored += query_builder.build().execute(&mut **tx).await?.rows_affected();
        }

        Ok(stored)
    }
}
