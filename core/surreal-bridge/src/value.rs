//! Store value model.
//!
//! Mirrors the value kinds a SurrealDB response can carry. Objects keep their
//! native entry order; `Display` renders the store's own textual form, which
//! is what the normalizer falls back to for types JSON has no slot for.

use serde_json::Value as JsonValue;
use std::fmt;

/// One value as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    /// `NONE`: field absent
    None,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary-precision number, kept as its literal text
    Decimal(String),
    Strand(String),
    /// ISO-8601 timestamp text
    Datetime(String),
    /// Duration literal such as `1h30m`
    Duration(String),
    Uuid(String),
    /// Record id `table:id`
    Thing { table: String, id: Box<StoreValue> },
    Array(Vec<StoreValue>),
    Object(Vec<(String, StoreValue)>),
}

impl StoreValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::None | StoreValue::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, StoreValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, StoreValue::Array(_))
    }

    pub fn as_array(&self) -> Option<&[StoreValue]> {
        match self {
            StoreValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreValue::None => "none",
            StoreValue::Null => "null",
            StoreValue::Bool(_) => "bool",
            StoreValue::Int(_) => "int",
            StoreValue::Float(_) => "float",
            StoreValue::Decimal(_) => "decimal",
            StoreValue::Strand(_) => "string",
            StoreValue::Datetime(_) => "datetime",
            StoreValue::Duration(_) => "duration",
            StoreValue::Uuid(_) => "uuid",
            StoreValue::Thing { .. } => "record",
            StoreValue::Array(_) => "array",
            StoreValue::Object(_) => "object",
        }
    }

    /// Build an object from `(key, value)` pairs, preserving order.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, StoreValue)>) -> Self {
        StoreValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn thing(table: impl Into<String>, id: impl Into<StoreValue>) -> Self {
        StoreValue::Thing {
            table: table.into(),
            id: Box::new(id.into()),
        }
    }

    /// Text without the store's literal decoration (quotes, `d''`, `u''`).
    pub fn plain_text(&self) -> String {
        match self {
            StoreValue::Strand(s)
            | StoreValue::Datetime(s)
            | StoreValue::Duration(s)
            | StoreValue::Uuid(s)
            | StoreValue::Decimal(s) => s.clone(),
            StoreValue::Thing { table, id } => format!("{table}:{}", id.plain_text()),
            other => other.to_string(),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, prefix: &str, s: &str) -> fmt::Result {
    write!(f, "{prefix}'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl fmt::Display for StoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreValue::None => f.write_str("NONE"),
            StoreValue::Null => f.write_str("NULL"),
            StoreValue::Bool(b) => write!(f, "{b}"),
            StoreValue::Int(i) => write!(f, "{i}"),
            StoreValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}f"),
            StoreValue::Float(v) if v.is_finite() => write!(f, "{v}f"),
            StoreValue::Float(v) if v.is_nan() => f.write_str("NaN"),
            StoreValue::Float(v) if *v > 0.0 => f.write_str("Infinity"),
            StoreValue::Float(_) => f.write_str("-Infinity"),
            StoreValue::Decimal(d) => write!(f, "{d}dec"),
            StoreValue::Strand(s) => write_quoted(f, "", s),
            StoreValue::Datetime(s) => write_quoted(f, "d", s),
            StoreValue::Duration(s) => f.write_str(s),
            StoreValue::Uuid(s) => write_quoted(f, "u", s),
            StoreValue::Thing { table, id } => match id.as_ref() {
                StoreValue::Strand(s) => write!(f, "{table}:{s}"),
                other => write!(f, "{table}:{other}"),
            },
            StoreValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            StoreValue::Object(entries) => {
                if entries.is_empty() {
                    return f.write_str("{  }");
                }
                f.write_str("{ ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl From<bool> for StoreValue {
    fn from(v: bool) -> Self {
        StoreValue::Bool(v)
    }
}

impl From<i64> for StoreValue {
    fn from(v: i64) -> Self {
        StoreValue::Int(v)
    }
}

impl From<f64> for StoreValue {
    fn from(v: f64) -> Self {
        StoreValue::Float(v)
    }
}

impl From<&str> for StoreValue {
    fn from(v: &str) -> Self {
        StoreValue::Strand(v.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(v: String) -> Self {
        StoreValue::Strand(v)
    }
}

impl From<Vec<StoreValue>> for StoreValue {
    fn from(v: Vec<StoreValue>) -> Self {
        StoreValue::Array(v)
    }
}

/// JSON wire form (HTTP endpoint) → store value. Record ids, datetimes etc.
/// arrive as plain strings on that wire and stay strands.
impl From<JsonValue> for StoreValue {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => StoreValue::Null,
            JsonValue::Bool(b) => StoreValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => StoreValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => StoreValue::Float(f),
                    None => StoreValue::Decimal(n.to_string()),
                },
            },
            JsonValue::String(s) => StoreValue::Strand(s),
            JsonValue::Array(items) => StoreValue::Array(items.into_iter().map(Into::into).collect()),
            JsonValue::Object(map) => {
                StoreValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_scalars() {
        assert_eq!(StoreValue::Strand("it's".into()).to_string(), "'it\\'s'");
        assert_eq!(StoreValue::Int(42).to_string(), "42");
        assert_eq!(StoreValue::Float(1.0).to_string(), "1.0f");
        assert_eq!(StoreValue::Float(2.5).to_string(), "2.5f");
        assert_eq!(StoreValue::Decimal("9.99".into()).to_string(), "9.99dec");
        assert_eq!(StoreValue::None.to_string(), "NONE");
        assert_eq!(
            StoreValue::Datetime("2024-01-01T00:00:00Z".into()).to_string(),
            "d'2024-01-01T00:00:00Z'"
        );
        assert_eq!(StoreValue::thing("person", "tobie").to_string(), "person:tobie");
        assert_eq!(StoreValue::thing("order", 7i64).to_string(), "order:7");
    }

    #[test]
    fn test_display_nested() {
        let value = StoreValue::object([
            ("name", StoreValue::from("Alice")),
            ("tags", StoreValue::Array(vec![1i64.into(), 2i64.into()])),
        ]);
        assert_eq!(value.to_string(), "{ name: 'Alice', tags: [1, 2] }");
        assert_eq!(StoreValue::Object(vec![]).to_string(), "{  }");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(StoreValue::Uuid("0190".into()).plain_text(), "0190");
        assert_eq!(StoreValue::thing("person", "tobie").plain_text(), "person:tobie");
        assert_eq!(StoreValue::Bool(true).plain_text(), "true");
    }

    #[test]
    fn test_from_json_keeps_order() {
        let value = StoreValue::from(json!({"z": 1, "a": [true, null], "m": 1.5}));
        let StoreValue::Object(entries) = value else {
            panic!("expected object");
        };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(entries[1].1, StoreValue::Array(vec![StoreValue::Bool(true), StoreValue::Null]));
        assert_eq!(entries[2].1, StoreValue::Float(1.5));
    }
}
