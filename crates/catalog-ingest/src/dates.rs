//! `date_added` normalization
//!
//! The export writes dates by hand-ish: mostly "September 9, 2019", sometimes
//! with a leading space, sometimes ISO. Anything not recognised becomes
//! unknown (`None`) instead of failing the run.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date-only layouts, tried in order. Month-first wins for `01/02/2020`.
const DATE_FORMATS: &[&str] = &[
    "%B %d, %Y", // September 9, 2019 / Sep 9, 2019
    "%B %d %Y",  // September 9 2019
    "%d %B %Y",  // 9 September 2019
    "%Y-%m-%d",  // 2019-09-09
    "%Y/%m/%d",  // 2019/09/09
    "%m/%d/%Y",  // 09/09/2019
    "%d-%b-%y",  // 9-Sep-19
    "%d-%b-%Y",  // 9-Sep-2019
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parse a free-text `date_added` value, `None` when missing or unrecognised
pub fn normalize_date_added(raw: Option<&str>) -> Option<NaiveDate> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}
