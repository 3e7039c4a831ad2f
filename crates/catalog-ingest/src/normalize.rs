//! Multi-value field normalization
//!
//! The export packs directors, countries and categories into comma-separated
//! cells. Each of those columns becomes an entity table of distinct trimmed
//! names plus a junction table back to the titles. All three go through the
//! same routine, parameterized by [`MultiValueField`].

use std::collections::HashMap;

use crate::models::StagingRecord;

/// Separator used inside multi-value cells
pub const DELIMITER: char = ',';

/// A comma-separated column and the tables it normalizes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiValueField {
    Directors,
    Categories,
    Countries,
}

impl MultiValueField {
    pub const ALL: [MultiValueField; 3] = [
        MultiValueField::Directors,
        MultiValueField::Categories,
        MultiValueField::Countries,
    ];

    /// Column in the staging table holding the raw list
    pub fn source_column(self) -> &'static str {
        match self {
            MultiValueField::Directors => "director",
            MultiValueField::Categories => "listed_in",
            MultiValueField::Countries => "country",
        }
    }

    pub fn entity_table(self) -> &'static str {
        match self {
            MultiValueField::Directors => "directors",
            MultiValueField::Categories => "categories",
            MultiValueField::Countries => "countries",
        }
    }

    pub fn junction_table(self) -> &'static str {
        match self {
            MultiValueField::Directors => "titles_directors",
            MultiValueField::Categories => "titles_categories",
            MultiValueField::Countries => "titles_countries",
        }
    }

    /// Column of the junction table referencing the entity table
    pub fn junction_column(self) -> &'static str {
        match self {
            MultiValueField::Directors => "director_id",
            MultiValueField::Categories => "category_id",
            MultiValueField::Countries => "country_id",
        }
    }

    /// Raw cell of this field on one record
    pub fn raw_value(self, record: &StagingRecord) -> Option<&str> {
        match self {
            MultiValueField::Directors => record.director.as_deref(),
            MultiValueField::Categories => record.listed_in.as_deref(),
            MultiValueField::Countries => record.country.as_deref(),
        }
    }
}

impl std::fmt::Display for MultiValueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entity_table())
    }
}

/// Trimmed, non-empty tokens of a raw cell, in order, duplicates kept
pub fn split_multi_value(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.into_iter()
        .flat_map(|value| value.split(DELIMITER))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Distinct entity names with surrogate ids assigned in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    names: Vec<String>,
    ids: HashMap<String, i32>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, assigning the next one if it is new
    pub fn intern(&mut self, name: &str) -> i32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        self.names.push(name.to_string());
        let id = self.names.len() as i32;
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.ids.get(name).copied()
    }

    /// `(id, name)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(idx, name)| (idx as i32 + 1, name.as_str()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Collect the distinct names of one field across all records
pub fn collect_entities(records: &[StagingRecord], field: MultiValueField) -> EntitySet {
    let mut entities = EntitySet::new();
    for record in records {
        for token in split_multi_value(field.raw_value(record)) {
            entities.intern(token);
        }
    }
    entities
}
