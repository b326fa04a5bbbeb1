// Measurement model: the record written to the metrics store once per cycle

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A single field sample. Numeric when the device reported something parseable,
/// otherwise the raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Best-effort coercion: integer first, then float, else the string unchanged.
    /// `"5"` is `Integer(5)`, `"5.2"` is `Float(5.2)`, `"1e3"` is `Float(1000.0)`.
    pub fn coerce(raw: String) -> Self {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return FieldValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return FieldValue::Float(f);
        }
        FieldValue::Text(raw)
    }

    /// Numeric view of the value; `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// One time-series point: series name, categorical tags and sampled fields.
/// Keys are kept sorted so output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}
