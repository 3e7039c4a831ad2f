//! Relational schema for the title catalogue
//!
//! Eight tables: the verbatim staging table, the title table, three entity
//! lookup tables and three junction tables. [`TABLES`] lists them in creation
//! order (every table after the tables it references); dropping walks the
//! same list backwards.

use sqlx::PgConnection;
use tracing::{info, instrument};

use crate::db::{with_foreign_key_checks_disabled, DbError, DbResult};

/// One table of the catalogue schema
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    /// Tables this one holds foreign keys into
    pub references: &'static [&'static str],
    pub ddl: &'static str,
}

pub const STAGING_TABLE: &str = "netflix_titles";

// =============================================================================
// Staging + titles
// =============================================================================

pub static NETFLIX_TITLES: TableSchema = TableSchema {
    name: STAGING_TABLE,
    references: &[],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS netflix_titles (
            show_id VARCHAR(16) PRIMARY KEY,
            type TEXT,
            title TEXT NOT NULL,
            director TEXT,
            "cast" TEXT,
            country TEXT,
            date_added DATE,
            release_year INTEGER,
            rating TEXT,
            duration TEXT,
            listed_in TEXT,
            description TEXT
        )
    "#,
};

pub static TITLES: TableSchema = TableSchema {
    name: "titles",
    references: &[],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS titles (
            show_id VARCHAR(16) PRIMARY KEY,
            title TEXT NOT NULL,
            type TEXT,
            release_year INTEGER,
            rating TEXT,
            duration TEXT,
            date_added DATE,
            description TEXT
        )
    "#,
};

// =============================================================================
// Entity lookup tables
// =============================================================================

pub static DIRECTORS: TableSchema = TableSchema {
    name: "directors",
    references: &[],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS directors (
            id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE
        )
    "#,
};

pub static CATEGORIES: TableSchema = TableSchema {
    name: "categories",
    references: &[],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE
        )
    "#,
};

pub static COUNTRIES: TableSchema = TableSchema {
    name: "countries",
    references: &[],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS countries (
            id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE
        )
    "#,
};

// =============================================================================
// Junction tables
// =============================================================================

pub static TITLES_DIRECTORS: TableSchema = TableSchema {
    name: "titles_directors",
    references: &["titles", "directors"],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS titles_directors (
            show_id VARCHAR(16) NOT NULL REFERENCES titles (show_id),
            director_id INTEGER NOT NULL REFERENCES directors (id),
            PRIMARY KEY (show_id, director_id)
        )
    "#,
};

pub static TITLES_CATEGORIES: TableSchema = TableSchema {
    name: "titles_categories",
    references: &["titles", "categories"],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS titles_categories (
            show_id VARCHAR(16) NOT NULL REFERENCES titles (show_id),
            category_id INTEGER NOT NULL REFERENCES categories (id),
            PRIMARY KEY (show_id, category_id)
        )
    "#,
};

pub static TITLES_COUNTRIES: TableSchema = TableSchema {
    name: "titles_countries",
    references: &["titles", "countries"],
    ddl: r#"
        CREATE TABLE IF NOT EXISTS titles_countries (
            show_id VARCHAR(16) NOT NULL REFERENCES titles (show_id),
            country_id INTEGER NOT NULL REFERENCES countries (id),
            PRIMARY KEY (show_id, country_id)
        )
    "#,
};

/// All tables in creation order
pub static TABLES: [&TableSchema; 8] = [
    &NETFLIX_TITLES,
    &TITLES,
    &DIRECTORS,
    &CATEGORIES,
    &COUNTRIES,
    &TITLES_DIRECTORS,
    &TITLES_CATEGORIES,
    &TITLES_COUNTRIES,
];

/// Table names in the order they are dropped: junctions, entities, titles, staging
pub fn drop_order() -> impl Iterator<Item = &'static str> {
    TABLES.iter().rev().map(|table| table.name)
}

/// Drop and recreate every catalogue table
///
/// Safe on an empty database and on one that already holds the tables.
/// Drops and creates each run in their own transaction, so a failure in
/// either leaves the schema as it was before that half started.
#[instrument(skip(conn))]
pub async fn reset(conn: &mut PgConnection) -> DbResult<()> {
    drop_all_tables(conn).await?;
    create_tables(conn).await?;
    info!("Schema reset complete");
    Ok(())
}

/// Drop every catalogue table with foreign-key checks disabled
pub async fn drop_all_tables(conn: &mut PgConnection) -> DbResult<()> {
    with_foreign_key_checks_disabled(conn, |conn| {
        Box::pin(async move {
            let mut tx = sqlx::Connection::begin(&mut *conn).await?;
            for table in drop_order() {
                sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                    .execute(&mut *tx)
                    .await?;
                info!(table, "Table dropped");
            }
            tx.commit().await?;
            Ok::<(), DbError>(())
        })
    })
    .await?;

    info!("All tables dropped");
    Ok(())
}

/// Create every catalogue table in dependency order
pub async fn create_tables(conn: &mut PgConnection) -> DbResult<()> {
    let mut tx = sqlx::Connection::begin(&mut *conn).await?;
    for table in TABLES.iter() {
        sqlx::query(table.ddl).execute(&mut *tx).await?;
        info!(table = table.name, "Table created");
    }
    tx.commit().await?;

    info!("Tables created");
    Ok(())
}
