//! Read side of the catalogue
//!
//! One row per title with its directors, countries and categories folded
//! into lists. Titles without a given relationship come back with an empty
//! list rather than being dropped.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::DbResult;

/// A title together with its normalized relationships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CatalogTitle {
    pub show_id: String,
    pub title: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub release_year: Option<i32>,
    pub rating: Option<String>,
    pub duration: Option<String>,
    pub date_added: Option<NaiveDate>,
    pub description: Option<String>,
    pub directors: Vec<String>,
    pub countries: Vec<String>,
    pub categories: Vec<String>,
}

const SEARCH_QUERY: &str = r#"
    SELECT
        t.show_id,
        t.title,
        t.type,
        t.release_year,
        t.rating,
        t.duration,
        t.date_added,
        t.description,
        COALESCE(
            array_agg(DISTINCT d.name ORDER BY d.name) FILTER (WHERE d.name IS NOT NULL),
            '{}'
        )::TEXT[] AS directors,
        COALESCE(
            array_agg(DISTINCT co.name ORDER BY co.name) FILTER (WHERE co.name IS NOT NULL),
            '{}'
        )::TEXT[] AS countries,
        COALESCE(
            array_agg(DISTINCT ca.name ORDER BY ca.name) FILTER (WHERE ca.name IS NOT NULL),
            '{}'
        )::TEXT[] AS categories
    FROM titles t
    LEFT JOIN titles_directors td ON td.show_id = t.show_id
    LEFT JOIN directors d ON d.id = td.director_id
    LEFT JOIN titles_countries tco ON tco.show_id = t.show_id
    LEFT JOIN countries co ON co.id = tco.country_id
    LEFT JOIN titles_categories tca ON tca.show_id = t.show_id
    LEFT JOIN categories ca ON ca.id = tca.category_id
    WHERE $1::TEXT IS NULL OR t.title ILIKE '%' || $1 || '%'
    GROUP BY t.show_id
    ORDER BY t.title ASC, t.show_id ASC
"#;

/// List titles, optionally filtered by a case-insensitive substring of the title
#[instrument(skip(pool))]
pub async fn search_titles(pool: &PgPool, search: Option<&str>) -> DbResult<Vec<CatalogTitle>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());

    let titles = sqlx::query_as::<_, CatalogTitle>(SEARCH_QUERY)
        .bind(search)
        .fetch_all(pool)
        .await?;

    debug!(count = titles.len(), "Catalogue query returned");
    Ok(titles)
}
