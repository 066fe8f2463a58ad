//! Schema-bound records
//!
//! A `Record` always carries one value per schema field, so every output row
//! exposes the full column set. Fields that could not be resolved hold
//! `FieldValue::NotFound`, which the exporters render as an empty CSV cell or
//! JSON `null`.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A single extracted value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Sentinel for anything that could not be resolved
    #[default]
    NotFound,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Flat string form used for CSV cells and scalar coercion.
    ///
    /// Booleans become `"1"`/`"0"` and the sentinel becomes the empty string.
    pub fn to_cell(&self) -> String {
        match self {
            Self::NotFound => String::new(),
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{f:.1}"),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::List(items) => serde_json::to_string(items).unwrap_or_default(),
        }
    }

    /// Coerce to a plain text scalar, keeping the sentinel as is
    pub fn coerce_scalar(&self) -> Self {
        match self {
            Self::NotFound => Self::NotFound,
            other => Self::Text(other.to_cell()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::NotFound => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::from(items.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::NotFound, Self::Integer)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Into::into)
    }
}

/// Ordered field list shared by every record of one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self {
            name: name.into(),
            fields: Vec::new(),
            index: HashMap::new(),
        };
        for field in fields {
            schema.push_field(field.into());
        }
        schema
    }

    fn push_field(&mut self, field: String) {
        if self.index.contains_key(&field) {
            return;
        }
        self.index.insert(field.clone(), self.fields.len());
        self.fields.push(field);
    }

    /// Copy of this schema with an extra trailing column
    pub fn with_field(&self, field: impl Into<String>) -> Self {
        let mut schema = self.clone();
        schema.push_field(field.into());
        schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.index.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Partial set of field values produced by one extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    entries: Vec<(String, FieldValue)>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.entries.push((field.into(), value.into()));
    }

    pub fn extend(&mut self, other: RecordPatch) {
        self.entries.extend(other.entries);
    }

    /// Last value written for `field`
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.entries.iter().rev().find(|(name, _)| name == field).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<FieldValue>,
}

impl Record {
    /// A record with every field set to the sentinel
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![FieldValue::NotFound; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Set a field; returns false when the schema has no such field
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> bool {
        match self.schema.position(field) {
            Some(pos) => {
                self.values[pos] = value.into();
                true
            }
            None => {
                debug!("Ignoring value for unknown field '{}' in schema '{}'", field, self.schema.name());
                false
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema.position(field).map(|pos| &self.values[pos])
    }

    pub fn apply(&mut self, patch: &RecordPatch) {
        for (field, value) in patch.iter() {
            self.set(field, value.clone());
        }
    }

    /// Number of fields holding something other than the sentinel
    pub fn found_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_found()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema.fields().iter().map(String::as_str).zip(self.values.iter())
    }

    /// Replace every value with its text scalar form
    pub fn coerce_scalars(&mut self) {
        for value in &mut self.values {
            *value = value.coerce_scalar();
        }
    }

    /// Cells in schema order
    pub fn to_row(&self) -> Vec<String> {
        self.values.iter().map(FieldValue::to_cell).collect()
    }

    /// Re-home this record onto a wider schema, carrying over shared fields
    pub fn widen(self, schema: Arc<Schema>) -> Self {
        let mut widened = Record::new(schema);
        for (field, value) in self.schema.fields().iter().zip(self.values) {
            widened.set(field, value);
        }
        widened
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field, &value.to_json())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("film", ["Film_title", "Runtime", "Genres"]))
    }

    #[test]
    fn test_new_record_has_full_schema_of_sentinels() {
        let record = Record::new(schema());
        assert_eq!(record.iter().count(), 3);
        assert!(record.iter().all(|(_, v)| !v.is_found()));
        assert_eq!(record.to_row(), vec!["", "", ""]);
    }

    #[test]
    fn test_apply_patch_ignores_unknown_fields() {
        let mut patch = RecordPatch::new();
        patch.set("Film_title", "Heat");
        patch.set("Nonexistent", 1_i64);
        patch.set("Runtime", 170_i64);

        let mut record = Record::new(schema());
        record.apply(&patch);

        assert_eq!(record.get("Film_title"), Some(&FieldValue::text("Heat")));
        assert_eq!(record.get("Runtime"), Some(&FieldValue::Integer(170)));
        assert_eq!(record.get("Genres"), Some(&FieldValue::NotFound));
        assert_eq!(record.get("Nonexistent"), None);
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(FieldValue::Bool(true).to_cell(), "1");
        assert_eq!(FieldValue::Bool(false).to_cell(), "0");
        assert_eq!(FieldValue::Float(4.0).to_cell(), "4.0");
        assert_eq!(FieldValue::Float(3.5).to_cell(), "3.5");
        assert_eq!(
            FieldValue::List(vec!["Crime".into(), "Drama".into()]).to_cell(),
            r#"["Crime","Drama"]"#
        );
    }

    #[test]
    fn test_coerce_scalars_keeps_sentinel() {
        let mut record = Record::new(schema());
        record.set("Runtime", 170_i64);
        record.coerce_scalars();
        assert_eq!(record.get("Runtime"), Some(&FieldValue::text("170")));
        assert_eq!(record.get("Film_title"), Some(&FieldValue::NotFound));
    }

    #[test]
    fn test_widen_adds_trailing_column() {
        let base = schema();
        let wide = Arc::new(base.with_field("List_URL"));
        let mut record = Record::new(base);
        record.set("Film_title", "Heat");

        let mut widened = record.widen(wide);
        widened.set("List_URL", "https://letterboxd.com/u/list/x/");
        assert_eq!(widened.schema().fields().last().map(String::as_str), Some("List_URL"));
        assert_eq!(widened.get("Film_title"), Some(&FieldValue::text("Heat")));
    }

    #[test]
    fn test_json_serialization_preserves_order_and_nulls() {
        let mut record = Record::new(schema());
        record.set("Runtime", 170_i64);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Film_title":null,"Runtime":170,"Genres":null}"#);
    }
}
