use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single scalar cell read from the data store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Reads the value as a point in time. Text cells are accepted in RFC 3339,
    /// `YYYY-MM-DD HH:MM:SS` or plain `YYYY-MM-DD` form.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            FieldValue::Text(s) => parse_timestamp(s.trim()),
            _ => None,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", if *b { "sim" } else { "não" }),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M")),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// One row of the external dataset: named fields in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing an existing value in place so column order is kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Snapshot of one logical collection, fetched wholesale for a request.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub fetched_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(records: Vec<Record>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            records,
            fetched_at,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = Record::new().with("cidade", "Recife").with("tipo", "buraco");
        record.insert("cidade", "Olinda");
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["cidade", "tipo"]);
        assert_eq!(record.get("cidade"), Some(&FieldValue::from("Olinda")));
    }

    #[test]
    fn test_text_timestamp_formats_parse() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(FieldValue::from("2024-03-05").as_timestamp(), Some(expected));
        assert_eq!(
            FieldValue::from("2024-03-05 00:00:00").as_timestamp(),
            Some(expected)
        );
        assert_eq!(
            FieldValue::from("2024-03-05T00:00:00Z").as_timestamp(),
            Some(expected)
        );
        assert_eq!(FieldValue::from("ontem").as_timestamp(), None);
        assert_eq!(FieldValue::Integer(5).as_timestamp(), None);
    }

    #[test]
    fn test_display_null_is_empty() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::Bool(true).to_string(), "sim");
    }

    #[test]
    fn test_record_serializes_as_ordered_map() {
        let record = Record::new()
            .with("tipo", "buraco")
            .with("anonimo", false)
            .with("bairro", None::<String>);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"tipo":"buraco","anonimo":false,"bairro":null}"#);
    }
}
