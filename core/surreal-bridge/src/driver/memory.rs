//! In-process scripted driver.
//!
//! Serves canned responses keyed by statement text and records every call it
//! receives, so session lifecycle and result handling can be exercised
//! without a running server. Clones share state.

use super::{Connection, Driver, RootCredentials, StatementResult, StoreResponse};
use crate::error::{BridgeError, BridgeResult};
use crate::value::StoreValue;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// A call observed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connect { conn: u64, uri: String },
    Signin { conn: u64, user: String },
    UseNs { conn: u64, namespace: String },
    UseDb { conn: u64, database: String },
    Query { conn: u64, sql: String },
    Close { conn: u64 },
}

#[derive(Default)]
struct Failures {
    connect: HashSet<String>,
    signin: HashSet<String>,
    scope: HashSet<String>,
    close: HashSet<String>,
    transport: HashSet<String>,
}

#[derive(Default)]
struct MemoryState {
    responses: Mutex<HashMap<String, Vec<StatementResult>>>,
    users: Mutex<HashMap<String, String>>,
    failures: Mutex<Failures>,
    events: Mutex<Vec<DriverEvent>>,
    connect_delay: Mutex<Option<Duration>>,
    next_conn: AtomicU64,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryState {
    fn record(&self, event: DriverEvent) {
        self.events.lock().push(event);
    }
}

/// Scripted in-memory driver.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<MemoryState>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with a single successful statement returning `rows`.
    pub fn respond(&self, sql: impl Into<String>, rows: Vec<StoreValue>) -> &Self {
        self.respond_with(sql, vec![StatementResult::ok(StoreValue::Array(rows))])
    }

    /// Answer `sql` with the given per-statement results.
    pub fn respond_with(&self, sql: impl Into<String>, statements: Vec<StatementResult>) -> &Self {
        self.state.responses.lock().insert(sql.into(), statements);
        self
    }

    /// Restrict sign-in to known users. With no users registered any
    /// credentials are accepted.
    pub fn add_user(&self, user: impl Into<String>, pass: impl Into<String>) -> &Self {
        self.state.users.lock().insert(user.into(), pass.into());
        self
    }

    /// Sleep this long inside every `connect`.
    pub fn set_connect_delay(&self, delay: Duration) -> &Self {
        *self.state.connect_delay.lock() = Some(delay);
        self
    }

    pub fn fail_connect(&self, uri: impl Into<String>) -> &Self {
        self.state.failures.lock().connect.insert(uri.into());
        self
    }

    pub fn fail_signin(&self, uri: impl Into<String>) -> &Self {
        self.state.failures.lock().signin.insert(uri.into());
        self
    }

    pub fn fail_scope(&self, uri: impl Into<String>) -> &Self {
        self.state.failures.lock().scope.insert(uri.into());
        self
    }

    pub fn fail_close(&self, uri: impl Into<String>) -> &Self {
        self.state.failures.lock().close.insert(uri.into());
        self
    }

    /// Make `query(sql)` fail at the transport level.
    pub fn fail_transport(&self, sql: impl Into<String>) -> &Self {
        self.state.failures.lock().transport.insert(sql.into());
        self
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.state.events.lock().clone()
    }

    /// Statements submitted so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state
            .events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DriverEvent::Query { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Driver for MemoryDriver {
    type Conn = MemoryConnection;

    fn connect(&self, uri: &str) -> BridgeResult<MemoryConnection> {
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if self.state.failures.lock().connect.contains(uri) {
            return Err(BridgeError::Connect {
                uri: uri.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let id = self.state.next_conn.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.record(DriverEvent::Connect {
            conn: id,
            uri: uri.to_string(),
        });

        Ok(MemoryConnection {
            id,
            uri: uri.to_string(),
            state: Arc::clone(&self.state),
            signed_in: false,
            namespace: None,
            database: None,
            closed: false,
        })
    }
}

/// Connection handed out by [`MemoryDriver`].
pub struct MemoryConnection {
    id: u64,
    uri: String,
    state: Arc<MemoryState>,
    signed_in: bool,
    namespace: Option<String>,
    database: Option<String>,
    closed: bool,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::Protocol(format!("connection #{} is closed", self.id)));
        }
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn signin(&mut self, credentials: &RootCredentials) -> BridgeResult<()> {
        self.ensure_open()?;
        let rejected = self.state.failures.lock().signin.contains(&self.uri) || {
            let users = self.state.users.lock();
            !users.is_empty() && users.get(&credentials.user) != Some(&credentials.pass)
        };
        if rejected {
            return Err(BridgeError::Auth {
                account: credentials.user.clone(),
                message: "There was a problem with authentication".to_string(),
            });
        }

        self.signed_in = true;
        self.state.record(DriverEvent::Signin {
            conn: self.id,
            user: credentials.user.clone(),
        });
        Ok(())
    }

    fn use_ns(&mut self, namespace: &str) -> BridgeResult<()> {
        self.ensure_open()?;
        if self.state.failures.lock().scope.contains(&self.uri) {
            return Err(BridgeError::Scope {
                namespace: namespace.to_string(),
                schema: self.database.clone().unwrap_or_default(),
                message: "namespace not permitted".to_string(),
            });
        }
        self.namespace = Some(namespace.to_string());
        self.state.record(DriverEvent::UseNs {
            conn: self.id,
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    fn use_db(&mut self, database: &str) -> BridgeResult<()> {
        self.ensure_open()?;
        self.database = Some(database.to_string());
        self.state.record(DriverEvent::UseDb {
            conn: self.id,
            database: database.to_string(),
        });
        Ok(())
    }

    fn query(&mut self, sql: &str) -> BridgeResult<StoreResponse> {
        self.ensure_open()?;
        if self.state.failures.lock().transport.contains(sql) {
            return Err(BridgeError::Protocol(format!(
                "connection #{} reset while sending query",
                self.id
            )));
        }
        if !self.signed_in {
            return Err(BridgeError::Auth {
                account: String::new(),
                message: "not signed in".to_string(),
            });
        }
        self.state.record(DriverEvent::Query {
            conn: self.id,
            sql: sql.to_string(),
        });

        if self.namespace.is_none() {
            return Ok(StoreResponse::new(
                sql,
                vec![StatementResult::err("Specify a namespace to use")],
            ));
        }
        if self.database.is_none() {
            return Ok(StoreResponse::new(
                sql,
                vec![StatementResult::err("Specify a database to use")],
            ));
        }

        let statements = self
            .state
            .responses
            .lock()
            .get(sql)
            .cloned()
            .unwrap_or_else(|| vec![StatementResult::ok(StoreValue::Array(Vec::new()))]);
        Ok(StoreResponse::new(sql, statements))
    }

    fn close(&mut self) -> BridgeResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.state.record(DriverEvent::Close { conn: self.id });

        if self.state.failures.lock().close.contains(&self.uri) {
            return Err(BridgeError::Protocol(format!(
                "connection #{} failed to shut down cleanly",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(driver: &MemoryDriver) -> MemoryConnection {
        let mut conn = driver.connect("mem://local").unwrap();
        conn.signin(&RootCredentials::new("root", "root")).unwrap();
        conn.use_ns("test").unwrap();
        conn.use_db("test").unwrap();
        conn
    }

    #[test]
    fn test_canned_response() {
        let driver = MemoryDriver::new();
        driver.respond("SELECT * FROM person", vec![StoreValue::Int(1)]);

        let mut conn = open(&driver);
        let mut response = conn.query("SELECT * FROM person").unwrap();
        assert_eq!(response.take(0).unwrap(), StoreValue::Array(vec![StoreValue::Int(1)]));

        let mut unknown = conn.query("SELECT * FROM nothing").unwrap();
        assert_eq!(unknown.take(0).unwrap(), StoreValue::Array(vec![]));
        assert_eq!(driver.queries().len(), 2);
    }

    #[test]
    fn test_signin_checks_registered_users() {
        let driver = MemoryDriver::new();
        driver.add_user("root", "secret");

        let mut conn = driver.connect("mem://local").unwrap();
        let err = conn.signin(&RootCredentials::new("root", "wrong")).unwrap_err();
        assert!(matches!(err, BridgeError::Auth { .. }));
        assert!(conn.signin(&RootCredentials::new("root", "secret")).is_ok());
    }

    #[test]
    fn test_query_without_scope_is_statement_error() {
        let driver = MemoryDriver::new();
        let mut conn = driver.connect("mem://local").unwrap();
        conn.signin(&RootCredentials::new("root", "root")).unwrap();

        let mut response = conn.query("INFO FOR DB").unwrap();
        assert!(matches!(response.take(0), Err(BridgeError::Query { .. })));
    }

    #[test]
    fn test_close_is_recorded_once() {
        let driver = MemoryDriver::new();
        let mut conn = open(&driver);
        conn.close().unwrap();
        assert!(conn.close().is_err());
        assert!(conn.query("SELECT 1").is_err());
        assert_eq!(driver.close_count(), 1);
    }

    #[test]
    fn test_events_in_order() {
        let driver = MemoryDriver::new();
        let conn = open(&driver);
        let id = conn.id();
        assert_eq!(
            driver.events(),
            vec![
                DriverEvent::Connect {
                    conn: id,
                    uri: "mem://local".to_string()
                },
                DriverEvent::Signin {
                    conn: id,
                    user: "root".to_string()
                },
                DriverEvent::UseNs {
                    conn: id,
                    namespace: "test".to_string()
                },
                DriverEvent::UseDb {
                    conn: id,
                    database: "test".to_string()
                },
            ]
        );
    }
}
