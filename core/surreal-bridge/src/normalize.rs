//! Result normalization: store values to ordered JSON records.
//!
//! Every row of the first statement's result set becomes a [`GenericRecord`]
//! (an insertion-ordered `serde_json::Map`). Object rows keep their field
//! order; any other row shape is wrapped under [`VALUE_KEY`].

use crate::config::{ArrayDecoding, ExecutorOptions};
use crate::error::{BridgeError, BridgeResult};
use crate::value::StoreValue;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

/// One decoded row, field order as returned by the store.
pub type GenericRecord = Map<String, JsonValue>;

/// Field holding a non-object row.
pub const VALUE_KEY: &str = "value";

/// Field carrying every row when a read returns more than one.
pub const RAW_LIST_KEY: &str = "@RAW@LIST";

/// All records produced by one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultBatch {
    records: Vec<GenericRecord>,
}

impl ResultBatch {
    pub fn new(records: Vec<GenericRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[GenericRecord] {
        &self.records
    }

    pub fn first(&self) -> Option<&GenericRecord> {
        self.records.first()
    }

    pub fn into_records(self) -> Vec<GenericRecord> {
        self.records
    }

    /// Single-row view: the first record (empty when there are no rows), plus
    /// every record under [`RAW_LIST_KEY`] when there is more than one.
    pub fn into_primary(self) -> GenericRecord {
        let mut primary = self.records.first().cloned().unwrap_or_default();
        if self.records.len() > 1 {
            let all = self.records.into_iter().map(JsonValue::Object).collect();
            primary.insert(RAW_LIST_KEY.to_string(), JsonValue::Array(all));
        }
        primary
    }
}

/// Store value → JSON decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    decode_unknown_types: bool,
    array_decoding: ArrayDecoding,
}

impl Normalizer {
    pub fn new(decode_unknown_types: bool, array_decoding: ArrayDecoding) -> Self {
        Self {
            decode_unknown_types,
            array_decoding,
        }
    }

    pub fn from_options(options: &ExecutorOptions) -> Self {
        Self::new(options.decode_unknown_types, options.array_decoding)
    }

    /// Decode a single value.
    pub fn decode(&self, value: &StoreValue) -> BridgeResult<JsonValue> {
        match value {
            StoreValue::None | StoreValue::Null => Ok(JsonValue::Null),
            StoreValue::Object(entries) => Ok(JsonValue::Object(self.decode_object(entries)?)),
            StoreValue::Array(items) => match self.array_decoding {
                ArrayDecoding::Recursive => Ok(JsonValue::Array(
                    items.iter().map(|item| self.decode(item)).collect::<BridgeResult<_>>()?,
                )),
                ArrayDecoding::Discard => Ok(JsonValue::Array(Vec::new())),
            },
            StoreValue::Bool(b) => Ok(JsonValue::Bool(*b)),
            StoreValue::Int(i) => Ok(JsonValue::Number((*i).into())),
            StoreValue::Float(f) => Ok(Number::from_f64(*f)
                .map(JsonValue::Number)
                // NaN / ±Infinity have no JSON number form
                .unwrap_or_else(|| JsonValue::String(value.to_string()))),
            StoreValue::Strand(s) if self.decode_unknown_types => Ok(parse_scalar_text(s)),
            StoreValue::Strand(s) => Ok(JsonValue::String(s.clone())),
            // JSON 에 대응 타입이 없으므로 텍스트로 풀어 가장 구체적인 스칼라로
            StoreValue::Decimal(_)
            | StoreValue::Datetime(_)
            | StoreValue::Duration(_)
            | StoreValue::Uuid(_)
            | StoreValue::Thing { .. } => Ok(parse_scalar_text(&value.plain_text())),
        }
    }

    /// Decode one result row into a record.
    pub fn decode_row(&self, row: &StoreValue) -> BridgeResult<GenericRecord> {
        match row {
            StoreValue::Object(entries) => self.decode_object(entries),
            StoreValue::Array(_) if self.array_decoding == ArrayDecoding::Discard => {
                Ok(GenericRecord::new())
            }
            other => {
                let mut record = GenericRecord::new();
                record.insert(VALUE_KEY.to_string(), self.decode(other)?);
                Ok(record)
            }
        }
    }

    /// Decode a statement result set. `NONE`/`NULL` count as an empty set.
    pub fn decode_rows(&self, result: &StoreValue) -> BridgeResult<ResultBatch> {
        let rows: &[StoreValue] = match result {
            StoreValue::Array(rows) => rows,
            StoreValue::None | StoreValue::Null => &[],
            other => {
                return Err(BridgeError::Decode(format!(
                    "expected a result set array, got {}",
                    other.kind()
                )));
            }
        };

        let records = rows
            .iter()
            .map(|row| self.decode_row(row))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(ResultBatch::new(records))
    }

    fn decode_object(&self, entries: &[(String, StoreValue)]) -> BridgeResult<GenericRecord> {
        let mut record = GenericRecord::new();
        for (key, value) in entries {
            if record.insert(key.clone(), self.decode(value)?).is_some() {
                return Err(BridgeError::Decode(format!("duplicate field '{key}' in object")));
            }
        }
        Ok(record)
    }
}

/// Best-effort parse of a value's text into the most specific JSON scalar.
///
/// `null`/`NONE` → null, booleans, integer and float literals → numbers,
/// single- or double-quoted text → the inner string, anything else → the raw
/// text.
pub fn parse_scalar_text(text: &str) -> JsonValue {
    let trimmed = text.trim();
    match trimmed {
        "null" | "NULL" | "NONE" => return JsonValue::Null,
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        _ => {}
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return JsonValue::Number(i.into());
    }
    // 숫자 형태만 허용 ("inf", "NaN" 등은 f64 파싱이 되지만 문자열로 남긴다)
    if trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return JsonValue::Number(number);
        }
    }

    if let Some(inner) = strip_quotes(trimmed) {
        return JsonValue::String(inner);
    }

    JsonValue::String(text.to_string())
}

fn strip_quotes(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    if text.len() < 2 || !text.ends_with(quote) {
        return None;
    }

    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}
