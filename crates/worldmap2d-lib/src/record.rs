//! Records and field access
//!
//! A [`Record`] is the read-only view of one dataset entry: the `(source, id)` pair that
//! identifies it plus an opaque JSON object of fields. Configured attribute names are
//! resolved through [`FieldPath`], a validated dotted path, never through evaluation.

use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Identity of a record: the dataset it came from and its id inside that dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub source: String,
    pub id: i64,
}

impl RecordKey {
    pub fn new(source: impl Into<String>, id: i64) -> Self {
        Self {
            source: source.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.source, self.id)
    }
}

/// One dataset entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record from a JSON value. Non-object values yield a record without fields.
    pub fn new(source: impl Into<String>, id: i64, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            other => {
                tracing::debug!("Ignoring non-object record payload: {}", other);
                Map::new()
            }
        };
        Self {
            key: RecordKey::new(source, id),
            fields,
        }
    }

    /// Build a record from a JSON object carrying its own numeric `id` field
    pub fn from_json(source: impl Into<String>, value: Value) -> Result<Self> {
        let source = source.into();
        let id = value
            .get("id")
            .and_then(value_as_i64)
            .ok_or_else(|| MapError::MissingAttribute {
                key: RecordKey::new(source.clone(), 0),
                attribute: "id".to_string(),
            })?;
        Ok(Self::new(source, id, value))
    }

    #[inline]
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.key.source
    }

    #[inline]
    pub fn id(&self) -> i64 {
        self.key.id
    }

    #[inline]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Top-level field lookup
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Nested lookup through a validated path
    pub fn resolve(&self, path: &FieldPath) -> Option<&Value> {
        let mut segments = path.segments.iter();
        let first = match segments.next()? {
            Segment::Key(key) => self.fields.get(key)?,
            Segment::Index(index) => self.fields.get(&index.to_string())?,
        };
        segments.try_fold(first, |value, segment| segment.step(value))
    }

    /// Numeric value at `path`. Numeric strings are accepted.
    pub fn number(&self, path: &FieldPath) -> Option<f64> {
        self.resolve(path).and_then(value_as_f64)
    }

    /// Field value as display text; `null` and missing fields render as `None`
    pub fn text(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether the field exists and is neither null nor an empty string
    pub fn has_value(&self, name: &str) -> bool {
        match self.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// Interpret a JSON value as a float, accepting numeric strings
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Segment::Key(key), Value::Object(map)) => map.get(key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        }
    }
}

/// A validated attribute path such as `position.lat` or `coords[1]`
///
/// Segments are identifiers (`[A-Za-z0-9_$-]+`) or array indices. Anything else is rejected
/// when the path is parsed, so a configured attribute name can never run code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: SmallVec<[Segment; 4]>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| MapError::InvalidFieldPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = SmallVec::new();
        for part in raw.split('.') {
            let (name, indices) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };

            if name.is_empty() && indices.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !name.is_empty() {
                if !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-'))
                {
                    return Err(invalid("segments may only contain letters, digits, '_', '$' and '-'"));
                }
                match name.parse::<usize>() {
                    Ok(index) if !segments.is_empty() => segments.push(Segment::Index(index)),
                    _ => segments.push(Segment::Key(name.to_string())),
                }
            }

            let mut rest = indices;
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| invalid("unclosed index bracket"))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("index must be a non-negative integer"))?;
                if segments.is_empty() {
                    return Err(invalid("path cannot start with an index"));
                }
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after index"));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// A one-segment path for a built-in attribute name
    pub(crate) fn single(name: &str) -> Self {
        let mut segments = SmallVec::new();
        segments.push(Segment::Key(name.to_string()));
        Self {
            raw: name.to_string(),
            segments,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for FieldPath {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor() -> Record {
        Record::new(
            "sensors",
            7,
            json!({
                "name": "North gate",
                "lat": "52.3",
                "lon": 8.9,
                "position": { "coords": [8.1, 52.1] },
                "note": null,
            }),
        )
    }

    #[test]
    fn test_simple_path() {
        let record = sensor();
        let path = FieldPath::parse("lon").unwrap();
        assert_eq!(record.number(&path), Some(8.9));
    }

    #[test]
    fn test_numeric_string_accepted() {
        let record = sensor();
        assert_eq!(record.number(&"lat".parse().unwrap()), Some(52.3));
    }

    #[test]
    fn test_nested_and_indexed_paths() {
        let record = sensor();
        let bracket = FieldPath::parse("position.coords[1]").unwrap();
        let dotted = FieldPath::parse("position.coords.0").unwrap();
        assert_eq!(record.number(&bracket), Some(52.1));
        assert_eq!(record.number(&dotted), Some(8.1));
    }

    #[test]
    fn test_rejects_code_like_paths() {
        for bad in ["", "a..b", "a b", "x()", "a[", "a[-1]", "[0]", "a]b", "lat;alert(1)"] {
            assert!(FieldPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_missing_fields() {
        let record = sensor();
        assert_eq!(record.number(&"altitude".parse().unwrap()), None);
        assert_eq!(record.text("note"), None);
        assert!(!record.has_value("note"));
        assert!(record.has_value("name"));
    }

    #[test]
    fn test_from_json_requires_id() {
        let ok = Record::from_json("models", json!({"id": "12", "x": 1})).unwrap();
        assert_eq!(ok.key(), &RecordKey::new("models", 12));
        assert!(Record::from_json("models", json!({"x": 1})).is_err());
    }

    #[test]
    fn test_field_path_serde() {
        let path: FieldPath = serde_json::from_value(json!("geo.coordinates")).unwrap();
        assert_eq!(path.as_str(), "geo.coordinates");
        assert!(serde_json::from_value::<FieldPath>(json!("geo coordinates")).is_err());
    }
}
