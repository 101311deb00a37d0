//! Connection and executor configuration.
//!
//! `ConnectionConfig` is the read-only view of the ORM's per-request config:
//! where to connect, who to sign in as, which scope to use, and the request
//! metadata (method, ids, values) needed to synthesize write outcomes.

use crate::scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend the ORM config targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseKind {
    #[default]
    #[serde(rename = "SURREALDB")]
    SurrealDb,
    MySql,
    PostgreSql,
    Sqlite,
    Other,
}

/// ORM request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    Get,
    Head,
    Gets,
    Heads,
    Post,
    Put,
    Delete,
    Crud,
}

impl RequestMethod {
    /// Read-only methods; everything else goes through outcome synthesis.
    pub fn is_query(self) -> bool {
        matches!(
            self,
            RequestMethod::Get | RequestMethod::Head | RequestMethod::Gets | RequestMethod::Heads
        )
    }

    /// Row-creating method; its count comes from the supplied value rows.
    pub fn is_create(self) -> bool {
        self == RequestMethod::Post
    }
}

/// Namespace / schema used when a SurrealDB config leaves them empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefaults {
    pub namespace: String,
    pub schema: String,
}

impl Default for ScopeDefaults {
    fn default() -> Self {
        Self {
            namespace: "test".to_string(),
            schema: "test".to_string(),
        }
    }
}

/// Per-request connection config supplied by the ORM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub uri: String,
    pub account: String,
    pub password: String,
    pub namespace: Option<String>,
    pub schema: Option<String>,
    pub database: DatabaseKind,
    pub method: RequestMethod,
    pub table: Option<String>,
    pub id_key: Option<String>,
    pub id: Option<Value>,
    pub id_in: Option<Value>,
    pub values: Option<Vec<Vec<Value>>>,
    #[serde(skip)]
    pub defaults: ScopeDefaults,
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>, account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            account: account.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Parse a config from its JSON form.
    pub fn from_json(json: &str) -> crate::BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_database(mut self, database: DatabaseKind) -> Self {
        self.database = database;
        self
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_id_in(mut self, ids: Vec<Value>) -> Self {
        self.id_in = Some(Value::Array(ids));
        self
    }

    pub fn with_values(mut self, values: Vec<Vec<Value>>) -> Self {
        self.values = Some(values);
        self
    }

    pub fn with_defaults(mut self, defaults: ScopeDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn is_surreal(&self) -> bool {
        self.database == DatabaseKind::SurrealDb
    }

    /// Identifier field name, `"id"` unless overridden.
    pub fn id_key(&self) -> &str {
        self.id_key.as_deref().unwrap_or("id")
    }

    /// Namespace to select on a new session.
    pub fn effective_namespace(&self) -> Option<&str> {
        scope::resolve_namespace(
            self.namespace.as_deref(),
            &self.defaults.namespace,
            self.is_surreal(),
        )
    }

    /// Schema (SurrealDB database) to select on a new session.
    pub fn effective_schema(&self) -> Option<&str> {
        scope::resolve_schema(self.schema.as_deref(), &self.defaults.schema, self.is_surreal())
    }

    /// Namespace for SQL statement generation; absent for SurrealDB.
    pub fn sql_namespace(&self) -> Option<&str> {
        scope::resolve_sql_namespace(self.namespace.as_deref(), self.is_surreal())
    }

    /// Schema for SQL statement generation; absent for SurrealDB.
    pub fn sql_schema(&self) -> Option<&str> {
        scope::resolve_sql_schema(self.schema.as_deref(), self.is_surreal())
    }
}

/// How arrays inside query results are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayDecoding {
    /// Decode every element recursively.
    #[default]
    Recursive,
    /// Drop array content (top-level array rows decode to `{}`, nested arrays to `[]`).
    /// Matches older adapters that walked array elements without keeping them.
    Discard,
}

/// Options controlling query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    /// Open a session on cache miss; when false a miss is `SessionUnavailable`.
    pub auto_create_session: bool,
    /// Also text-parse plain strings, so `"42"` decodes to `42` and `"true"` to `true`.
    pub decode_unknown_types: bool,
    pub array_decoding: ArrayDecoding,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            auto_create_session: true,
            decode_unknown_types: false,
            array_decoding: ArrayDecoding::Recursive,
        }
    }
}
