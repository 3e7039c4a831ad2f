//! Staging records parsed from the catalogue CSV export

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dates::normalize_date_added;

/// Column count of the export, for the shape log line
pub const COLUMN_COUNT: usize = 12;

/// Rows shown in the debug preview after a fetch
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV header is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: {column} is empty")]
    IncompleteRow { line: u64, column: &'static str },

    #[error("line {line}: show_id '{show_id}' already used on line {first_line}")]
    DuplicateShowId {
        show_id: String,
        line: u64,
        first_line: u64,
    },
}

/// One row exactly as the export spells it
#[derive(Debug, Clone, Deserialize)]
struct RawTitleRow {
    show_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    director: Option<String>,
    cast: Option<String>,
    country: Option<String>,
    date_added: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    release_year: Option<i32>,
    rating: Option<String>,
    duration: Option<String>,
    listed_in: Option<String>,
    description: Option<String>,
}

/// One title as loaded into the staging table
///
/// Multi-value columns (`director`, `cast`, `country`, `listed_in`) keep their
/// raw comma-separated text; `date_added` is already normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingRecord {
    pub show_id: String,
    pub kind: Option<String>,
    pub title: String,
    pub director: Option<String>,
    pub cast: Option<String>,
    pub country: Option<String>,
    pub date_added: Option<NaiveDate>,
    pub release_year: Option<i32>,
    pub rating: Option<String>,
    pub duration: Option<String>,
    pub listed_in: Option<String>,
    pub description: Option<String>,
}

impl StagingRecord {
    /// Minimal record, mostly for tests and fixtures
    pub fn new(show_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            show_id: show_id.into(),
            kind: None,
            title: title.into(),
            director: None,
            cast: None,
            country: None,
            date_added: None,
            release_year: None,
            rating: None,
            duration: None,
            listed_in: None,
            description: None,
        }
    }

    pub fn with_director(mut self, director: impl Into<String>) -> Self {
        self.director = Some(director.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_listed_in(mut self, listed_in: impl Into<String>) -> Self {
        self.listed_in = Some(listed_in.into());
        self
    }
}

/// Parsed export
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<StagingRecord>,
    /// Rows whose `date_added` was present but not understood
    pub unknown_dates: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Log the dataset shape and, at debug level, the first rows
    pub fn log_preview(&self) {
        info!(
            rows = self.records.len(),
            columns = COLUMN_COUNT,
            unknown_dates = self.unknown_dates,
            "Dataset shape"
        );
        for record in self.records.iter().take(PREVIEW_ROWS) {
            debug!(
                show_id = %record.show_id,
                kind = record.kind.as_deref().unwrap_or(""),
                title = %record.title,
                release_year = ?record.release_year,
                date_added = ?record.date_added,
                "Preview row"
            );
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

const REQUIRED_COLUMNS: [&str; COLUMN_COUNT] = [
    "show_id",
    "type",
    "title",
    "director",
    "cast",
    "country",
    "date_added",
    "release_year",
    "rating",
    "duration",
    "listed_in",
    "description",
];

/// Parse the raw CSV bytes of the export
///
/// Any row without a `show_id` or `title`, or repeating an earlier
/// `show_id`, rejects the whole export.
pub fn parse_csv(bytes: &[u8]) -> Result<Dataset, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(ParseError::MissingColumn(column));
        }
    }

    let mut dataset = Dataset::default();
    let mut first_seen: HashMap<String, u64> = HashMap::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let row: RawTitleRow = record.deserialize(Some(&headers))?;

        let show_id = non_empty(row.show_id)
            .ok_or(ParseError::IncompleteRow {
                line,
                column: "show_id",
            })?
            .trim()
            .to_string();
        let title = non_empty(row.title).ok_or(ParseError::IncompleteRow {
            line,
            column: "title",
        })?;

        if let Some(&first_line) = first_seen.get(&show_id) {
            return Err(ParseError::DuplicateShowId {
                show_id,
                line,
                first_line,
            });
        }
        first_seen.insert(show_id.clone(), line);

        let date_added_raw = non_empty(row.date_added);
        let date_added = normalize_date_added(date_added_raw.as_deref());
        if date_added_raw.is_some() && date_added.is_none() {
            debug!(show_id = %show_id, raw = ?date_added_raw, "Unrecognised date_added");
            dataset.unknown_dates += 1;
        }

        dataset.records.push(StagingRecord {
            show_id,
            kind: non_empty(row.kind),
            title,
            director: non_empty(row.director),
            cast: non_empty(row.cast),
            country: non_empty(row.country),
            date_added,
            release_year: row.release_year,
            rating: non_empty(row.rating),
            duration: non_empty(row.duration),
            listed_in: non_empty(row.listed_in),
            description: non_empty(row.description),
        });
    }

    if dataset.unknown_dates > 0 {
        warn!(
            rows = dataset.unknown_dates,
            "Stored unrecognised date_added values as NULL"
        );
    }

    Ok(dataset)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HEADER: &str =
        "show_id,type,title,director,cast,country,date_added,release_year,rating,duration,listed_in,description\n";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut out = HEADER.to_string();
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out.into_bytes()
    }

    #[test]
    fn test_parse_quoted_multi_value_fields() {
        let data = csv(&[
            r#"s1,Movie,Dick Johnson Is Dead,Kirsten Johnson,,United States,"September 25, 2021",2020,PG-13,90 min,Documentaries,"A son, a father."#,
            r#"s2,TV Show,Blood & Water,,"Ama Qamata, Khosi Ngema","South Africa, India"," September 24, 2021",2021,TV-MA,2 Seasons,"International TV Shows, TV Dramas",After crossing paths"#,
        ]);

        let dataset = parse_csv(&data).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = &dataset.records[0];
        assert_eq!(first.show_id, "s1");
        assert_eq!(first.kind.as_deref(), Some("Movie"));
        assert_eq!(first.director.as_deref(), Some("Kirsten Johnson"));
        assert_eq!(first.cast, None);
        assert_eq!(first.date_added, NaiveDate::from_ymd_opt(2021, 9, 25));
        assert_eq!(first.release_year, Some(2020));
        assert_eq!(first.description.as_deref(), Some("A son, a father."));

        let second = &dataset.records[1];
        assert_eq!(second.director, None);
        assert_eq!(second.country.as_deref(), Some("South Africa, India"));
        assert_eq!(
            second.listed_in.as_deref(),
            Some("International TV Shows, TV Dramas")
        );
        assert_eq!(second.date_added, NaiveDate::from_ymd_opt(2021, 9, 24));
    }

    #[test]
    fn test_bad_values_become_unknown() {
        let data = csv(&["s1,Movie,Title,,,,someday,unknown,,,,"]);
        let dataset = parse_csv(&data).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].date_added, None);
        assert_eq!(dataset.records[0].release_year, None);
        assert_eq!(dataset.unknown_dates, 1);
    }

    #[test]
    fn test_row_without_show_id_rejects_export() {
        let data = csv(&["s1,Movie,First,,,,,2020,,,,", ",Movie,No id,,,,,2020,,,,"]);
        match parse_csv(&data) {
            Err(ParseError::IncompleteRow { line, column }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "show_id");
            },
            other => panic!("expected incomplete row error, got {:?}", other),
        }
    }

    #[test]
    fn test_row_without_title_rejects_export() {
        let data = csv(&["s2,Movie,  ,,,,,2020,,,,"]);
        assert!(matches!(
            parse_csv(&data),
            Err(ParseError::IncompleteRow { column: "title", .. })
        ));
    }

    #[test]
    fn test_duplicate_show_id_rejects_export() {
        let data = csv(&["s1,Movie,First,,,,,2020,,,,", "s1,Movie,Again,,,,,2020,,,,"]);
        match parse_csv(&data) {
            Err(ParseError::DuplicateShowId {
                show_id,
                line,
                first_line,
            }) => {
                assert_eq!(show_id, "s1");
                assert_eq!(line, 3);
                assert_eq!(first_line, 2);
            },
            other => panic!("expected duplicate show_id error, got {:?}", other),
        }
    }

    #[test]
    fn test_padded_header_names_still_map_to_fields() {
        let data = b"show_id, type, title, director, cast, country, date_added, release_year, rating, duration, listed_in, description\n\
s1,Movie,Title,Alice,,India,2020-01-01,2019,PG,90 min,Dramas,Plot\n";
        let dataset = parse_csv(data).unwrap();

        assert_eq!(dataset.len(), 1);
        let record = &dataset.records[0];
        assert_eq!(record.show_id, "s1");
        assert_eq!(record.title, "Title");
        assert_eq!(record.director.as_deref(), Some("Alice"));
        assert_eq!(record.release_year, Some(2019));
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let data = b"show_id,type,title\ns1,Movie,Title\n";
        match parse_csv(data) {
            Err(ParseError::MissingColumn(column)) => assert_eq!(column, "director"),
            other => panic!("expected missing column error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_export_is_empty_dataset() {
        let dataset = parse_csv(HEADER.as_bytes()).unwrap();
        assert!(dataset.is_empty());
    }
}
