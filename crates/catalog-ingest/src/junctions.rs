//! Title ↔ entity relationship rows

use std::collections::HashSet;
use tracing::warn;

use crate::models::StagingRecord;
use crate::normalize::{collect_entities, split_multi_value, EntitySet, MultiValueField};

/// One row of a junction table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JunctionRow {
    pub show_id: String,
    pub entity_id: i32,
}

/// Junction rows for one record and one field
///
/// Tokens resolving to the same entity collapse to one row. An empty or
/// missing cell yields nothing.
pub fn junction_rows_for(
    record: &StagingRecord,
    field: MultiValueField,
    entities: &EntitySet,
) -> Vec<JunctionRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for token in split_multi_value(field.raw_value(record)) {
        let Some(entity_id) = entities.id_of(token) else {
            warn!(show_id = %record.show_id, %field, token, "Token has no entity, skipping");
            continue;
        };
        if seen.insert(entity_id) {
            rows.push(JunctionRow {
                show_id: record.show_id.clone(),
                entity_id,
            });
        }
    }

    rows
}

/// Entity table and junction table contents for one field
#[derive(Debug, Clone)]
pub struct NormalizedField {
    pub field: MultiValueField,
    pub entities: EntitySet,
    pub links: Vec<JunctionRow>,
}

/// Normalize one multi-value field across the whole dataset
pub fn normalize_field(records: &[StagingRecord], field: MultiValueField) -> NormalizedField {
    let entities = collect_entities(records, field);
    let links = records
        .iter()
        .flat_map(|record| junction_rows_for(record, field, &entities))
        .collect();

    NormalizedField {
        field,
        entities,
        links,
    }
}
