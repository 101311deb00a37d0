//! Write outcome synthesis.
//!
//! SurrealDB does not report an affected-row count for every statement shape,
//! so the count in a write outcome is derived from the request itself: the
//! number of value rows for a create, otherwise the identifier list size, or
//! 1 for a single (or implicit) target. The count is best-effort.

use crate::config::{ConnectionConfig, RequestMethod};
use crate::normalize::GenericRecord;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

pub const KEY_OK: &str = "ok";
pub const KEY_CODE: &str = "code";
pub const KEY_MSG: &str = "msg";
pub const KEY_COUNT: &str = "count";

pub const CODE_SUCCESS: u16 = 200;
pub const MSG_SUCCEED: &str = "success";

/// Success record returned for write operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutcomeEnvelope(GenericRecord);

impl OutcomeEnvelope {
    /// `{ "ok": true, "code": 200, "msg": "success" }`
    pub fn success() -> Self {
        let mut record = GenericRecord::new();
        record.insert(KEY_OK.to_string(), JsonValue::Bool(true));
        record.insert(KEY_CODE.to_string(), JsonValue::from(CODE_SUCCESS));
        record.insert(KEY_MSG.to_string(), JsonValue::from(MSG_SUCCEED));
        Self(record)
    }

    /// Affected-row count, 0 when unset.
    pub fn count(&self) -> usize {
        self.0
            .get(KEY_COUNT)
            .and_then(JsonValue::as_u64)
            .map_or(0, |count| count as usize)
    }

    pub fn record(&self) -> &GenericRecord {
        &self.0
    }

    pub fn into_record(self) -> GenericRecord {
        self.0
    }

    fn set(&mut self, key: impl Into<String>, value: JsonValue) {
        self.0.insert(key.into(), value);
    }
}

/// Build the outcome of a write.
///
/// - create: count = number of supplied value rows (0 if none)
/// - otherwise: the id is echoed under the id key and the id list under
///   `"<id key>[]"`; count = id list size when only a list was given, else 1
///
/// `returned_rows` is what the statement itself returned; it is logged next to
/// the derived count but does not change it.
pub fn synthesize(
    method: RequestMethod,
    config: &ConnectionConfig,
    returned_rows: Option<usize>,
) -> OutcomeEnvelope {
    let mut outcome = OutcomeEnvelope::success();

    let count = if method.is_create() {
        config.values.as_ref().map_or(0, Vec::len)
    } else {
        let id = config.id.as_ref().filter(|v| !v.is_null());
        let id_in = config.id_in.as_ref().filter(|v| !v.is_null());

        if let Some(id) = id {
            outcome.set(config.id_key(), id.clone());
        }
        if let Some(id_in) = id_in {
            outcome.set(format!("{}[]", config.id_key()), id_in.clone());
        }

        match (id, id_in) {
            (None, Some(JsonValue::Array(ids))) => ids.len(),
            _ => 1,
        }
    };

    outcome.set(KEY_COUNT, JsonValue::from(count));
    debug!(?method, count, ?returned_rows, "write outcome");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ConnectionConfig {
        ConnectionConfig::new("ws://db", "root", "root").with_table("person")
    }

    #[test]
    fn test_success_envelope() {
        let outcome = OutcomeEnvelope::success();
        assert_eq!(
            JsonValue::Object(outcome.into_record()),
            json!({"ok": true, "code": 200, "msg": "success"})
        );
    }

    #[test]
    fn test_create_counts_value_rows() {
        let config = base()
            .with_method(RequestMethod::Post)
            .with_values(vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
        let outcome = synthesize(RequestMethod::Post, &config, Some(2));
        assert_eq!(outcome.count(), 2);
        assert!(!outcome.record().contains_key("id"));
    }

    #[test]
    fn test_create_without_values() {
        let outcome = synthesize(RequestMethod::Post, &base(), None);
        assert_eq!(outcome.count(), 0);
    }

    #[test]
    fn test_single_id_echoed() {
        let config = base().with_id(json!("person:tobie"));
        let outcome = synthesize(RequestMethod::Put, &config, None);
        assert_eq!(outcome.count(), 1);
        assert_eq!(outcome.record()["id"], json!("person:tobie"));
    }

    #[test]
    fn test_id_list_counted() {
        let config = base().with_id_in(vec![json!(1), json!(2), json!(3), json!(4)]);
        let outcome = synthesize(RequestMethod::Delete, &config, Some(0));
        assert_eq!(outcome.count(), 4);
        assert_eq!(outcome.record()["id[]"], json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_custom_id_key() {
        let mut config = base().with_id(7);
        config.id_key = Some("uid".to_string());
        let outcome = synthesize(RequestMethod::Put, &config, None);
        assert_eq!(outcome.record()["uid"], json!(7));
    }

    #[test]
    fn test_no_target_defaults_to_one() {
        let outcome = synthesize(RequestMethod::Crud, &base(), None);
        assert_eq!(outcome.count(), 1);
    }

    #[test]
    fn test_id_and_list_both_echoed() {
        let config = base().with_id(1).with_id_in(vec![json!(1), json!(2)]);
        let outcome = synthesize(RequestMethod::Put, &config, None);
        assert_eq!(outcome.count(), 1);
        assert!(outcome.record().contains_key("id"));
        assert!(outcome.record().contains_key("id[]"));
    }
}
