//! Schema normalizer for structured diary dumps
//!
//! A dump arrives in one of several JSON shapes. The shape is decided once by
//! `RawShape::detect`; every entry is then mapped onto the fixed diary dump
//! schema and coerced to scalar text so it fits a CSV cell.

#![allow(clippy::uninlined_format_args)]

use serde_json::{Map, Value};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::schemas::{DIARY_DUMP_FIELDS, diary_dump_schema};
use crate::domain::value_normalizer::parse_date_parts;
use crate::domain::{FieldValue, Record, Schema};
use crate::infrastructure::scrape_error::ScrapeError;

const ENTRIES_KEY: &str = "entries";
const ACTIONS_KEY: &str = "actions";

/// Recognized input shapes
#[derive(Debug, Clone, PartialEq)]
pub enum RawShape<'a> {
    /// `{id: entry, ...}`, optionally wrapped as `{"entries": {id: entry}}`
    Keyed(Vec<&'a Value>),
    /// A single entry keyed by canonical field names
    Flat(&'a Map<String, Value>),
    /// Sequences of entries, concatenated in order
    Sequences(Vec<&'a Value>),
}

impl<'a> RawShape<'a> {
    pub fn detect(raw: &'a Value) -> Option<Self> {
        match raw {
            Value::Array(items) => Some(Self::Sequences(items.iter().collect())),
            Value::Object(map) => {
                if let Some(Value::Object(entries)) = map.get(ENTRIES_KEY) {
                    return Some(Self::Keyed(entries.values().collect()));
                }
                if is_flat_entry(map) {
                    return Some(Self::Flat(map));
                }
                if map.values().all(Value::is_object) {
                    return Some(Self::Keyed(map.values().collect()));
                }
                if map.values().any(Value::is_array) {
                    let sequences = map
                        .values()
                        .filter_map(Value::as_array)
                        .flat_map(|items| items.iter())
                        .collect();
                    return Some(Self::Sequences(sequences));
                }
                None
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyed(_) => "keyed",
            Self::Flat(_) => "flat",
            Self::Sequences(_) => "sequences",
        }
    }

    /// Entry objects; anything that is not an object is dropped
    pub fn entries(&self) -> Vec<&'a Map<String, Value>> {
        match self {
            Self::Flat(map) => vec![*map],
            Self::Keyed(values) | Self::Sequences(values) => values.iter().copied().filter_map(Value::as_object).collect(),
        }
    }
}

/// A canonical field with a scalar value at the top level
fn is_flat_entry(map: &Map<String, Value>) -> bool {
    map.iter()
        .any(|(key, value)| !value.is_object() && !value.is_array() && DIARY_DUMP_FIELDS.contains(&key.as_str()))
}

/// Where a canonical field is read from in an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSource {
    Top,
    Action,
    Date,
}

fn source_of(field: &str) -> FieldSource {
    match field {
        "rewatched" | "rating" | "liked" | "reviewed" => FieldSource::Action,
        "date" => FieldSource::Date,
        _ => FieldSource::Top,
    }
}

pub struct SchemaNormalizer {
    schema: Arc<Schema>,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(diary_dump_schema())
    }
}

impl SchemaNormalizer {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Records for every entry of `raw`; unrecognized input gives none
    pub fn normalize(&self, raw: &Value) -> Vec<Record> {
        let Some(shape) = RawShape::detect(raw) else {
            let ambiguity = ScrapeError::SchemaNormalizationAmbiguity {
                shape: describe(raw),
            };
            warn!("⚠️ {}", ambiguity);
            return Vec::new();
        };

        let entries = shape.entries();
        debug!("Normalizing {} entries from a {} dump", entries.len(), shape.name());
        entries.into_iter().map(|entry| self.normalize_entry(entry)).collect()
    }

    /// Parse JSON from `reader` and normalize it
    pub fn normalize_reader<R: Read>(&self, reader: R) -> Result<Vec<Record>, serde_json::Error> {
        let raw: Value = serde_json::from_reader(reader)?;
        Ok(self.normalize(&raw))
    }

    pub fn normalize_entry(&self, entry: &Map<String, Value>) -> Record {
        let actions = entry.get(ACTIONS_KEY).and_then(Value::as_object);
        let mut record = Record::new(self.schema.clone());

        for field in self.schema.fields() {
            let value = match source_of(field) {
                FieldSource::Top => entry.get(field).filter(|v| is_truthy(v)).map_or(FieldValue::NotFound, json_to_field),
                FieldSource::Action => actions
                    .and_then(|actions| actions.get(field))
                    .map_or(FieldValue::NotFound, json_to_field),
                FieldSource::Date => entry.get(field).map_or(FieldValue::NotFound, date_field),
            };
            record.set(field, value);
        }

        record.coerce_scalars();
        record
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn json_to_field(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::NotFound,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| n.as_f64().map(FieldValue::Float))
            .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        Value::String(s) => FieldValue::Text(s.clone()),
        other => FieldValue::Text(other.to_string()),
    }
}

/// `{year, month, day}` as `YYYY-MM-DD`, else the raw text
fn date_field(value: &Value) -> FieldValue {
    match value {
        Value::Object(parts) if parts.is_empty() => FieldValue::NotFound,
        Value::Object(parts) => {
            let part = |key: &str| parts.get(key).and_then(scalar_text);
            parse_date_parts(part("year").as_deref(), part("month").as_deref(), part("day").as_deref())
                .map_or_else(|| FieldValue::Text(value.to_string()), FieldValue::Text)
        }
        other if is_truthy(other) => json_to_field(other),
        _ => FieldValue::NotFound,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(map) => format!("object with keys [{}]", map.keys().cloned().collect::<Vec<_>>().join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cell(record: &Record, field: &str) -> String {
        record.get(field).map(FieldValue::to_cell).unwrap_or_default()
    }

    #[test]
    fn test_wrapped_keyed_entries() {
        let raw = json!({"entries": {"a": {"name": "Heat"}, "b": {"name": "Thief"}}, "count": 2});
        let records = SchemaNormalizer::default().normalize(&raw);

        assert_eq!(records.len(), 2);
        assert_eq!(cell(&records[0], "name"), "Heat");
        assert_eq!(records[1].schema().fields().len(), 10);
    }

    #[test]
    fn test_bare_keyed_entries() {
        let raw = json!({"111": {"slug": "heat"}, "222": {"slug": "thief"}});
        let records = SchemaNormalizer::default().normalize(&raw);
        assert_eq!(records.len(), 2);
        assert_eq!(cell(&records[1], "slug"), "thief");
    }

    #[test]
    fn test_flat_entry() {
        let raw = json!({"name": "Heat", "runtime": 170, "actions": {"liked": true}});
        let records = SchemaNormalizer::default().normalize(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(cell(&records[0], "runtime"), "170");
        assert_eq!(cell(&records[0], "liked"), "1");
    }

    #[test]
    fn test_sequences_are_concatenated() {
        let raw = json!({"page1": [{"name": "A"}, {"name": "B"}], "page2": [{"name": "C"}, 7]});
        let names: Vec<String> = SchemaNormalizer::default()
            .normalize(&raw)
            .iter()
            .map(|record| cell(record, "name"))
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_unrecognized_shape_is_empty() {
        assert!(SchemaNormalizer::default().normalize(&json!("diary")).is_empty());
        assert!(SchemaNormalizer::default().normalize(&json!({"count": 3})).is_empty());
    }

    #[test]
    fn test_entry_field_mapping() {
        let entry = json!({
            "name": "Heat",
            "id": 0,
            "release": "",
            "actions": {"rewatched": false, "rating": 9, "reviewed": null},
            "date": {"year": 2024, "month": "3", "day": 7}
        });
        let record = SchemaNormalizer::default().normalize_entry(entry.as_object().unwrap());

        assert_eq!(cell(&record, "id"), "");
        assert_eq!(cell(&record, "release"), "");
        assert_eq!(cell(&record, "rewatched"), "0");
        assert_eq!(cell(&record, "rating"), "9");
        assert_eq!(record.get("reviewed"), Some(&FieldValue::NotFound));
        assert_eq!(record.get("liked"), Some(&FieldValue::NotFound));
        assert_eq!(cell(&record, "date"), "2024-03-07");
    }

    #[test]
    fn test_incomplete_date_keeps_raw_text() {
        let entry = json!({"date": {"year": 2024, "month": "March"}});
        let record = SchemaNormalizer::default().normalize_entry(entry.as_object().unwrap());
        let date = cell(&record, "date");
        assert!(date.starts_with('{') && date.contains("\"March\""), "{date}");
    }
}
