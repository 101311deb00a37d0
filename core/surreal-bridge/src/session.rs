//! Session cache: one authenticated connection per endpoint + account.
//!
//! # Lifecycle
//!
//! - **init**: [`SessionRegistry::new`] starts empty.
//! - **runtime**: [`get_or_create`](SessionRegistry::get_or_create) opens,
//!   signs in and selects namespace/database on a miss; later hits return the
//!   same [`Session`]. [`close`](SessionRegistry::close) evicts one entry.
//! - **shutdown**: [`close_all`](SessionRegistry::close_all) releases every
//!   session, recording (not propagating) individual release failures.
//!
//! # Concurrency
//!
//! Each key owns a slot guarded by its own mutex. Creation happens while the
//! slot is locked, so concurrent callers for one key wait for the first
//! creation and then share its session; callers for other keys are not
//! blocked. The map itself is never touched while a slot lock is held.
//!
//! # Known limitation
//!
//! Namespace and schema are applied once, at creation. A later config with
//! the same URI + account but a different scope gets the existing session and
//! its original scope.

use crate::config::ConnectionConfig;
use crate::driver::{Connection, Driver, RootCredentials, StoreResponse};
use crate::error::{BridgeError, BridgeResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Cache identity of a session: endpoint URI plus account.
///
/// Namespace and schema are session state, not identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    /// `uri` + (`&` if the URI already has a query string, else `?`) +
    /// `username=<account>`, with the account's delimiter characters escaped
    /// so no account can forge a different URI's key.
    pub fn derive(config: &ConnectionConfig) -> Self {
        Self::from_parts(&config.uri, &config.account)
    }

    pub fn from_parts(uri: &str, account: &str) -> Self {
        let delimiter = if uri.contains('?') { '&' } else { '?' };
        let mut key = String::with_capacity(uri.len() + account.len() + 10);
        key.push_str(uri);
        key.push(delimiter);
        key.push_str("username=");
        escape_query_value(account, &mut key);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_query_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '?' => out.push_str("%3F"),
            '#' => out.push_str("%23"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
}

/// Authenticated, scope-selected connection.
pub struct Session<C: Connection> {
    id: u64,
    key: ConnectionKey,
    namespace: Option<String>,
    schema: Option<String>,
    created_at: Instant,
    conn: Mutex<C>,
    closed: AtomicBool,
}

impl<C: Connection> Session<C> {
    /// Registry-unique id, increasing in creation order.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Namespace selected at creation.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Schema (database) selected at creation.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Submit `sql` on this session's connection.
    ///
    /// Queries on one session are serialized; the connection is single-flight.
    pub fn query(&self, sql: &str) -> BridgeResult<StoreResponse> {
        let mut conn = self.conn.lock();
        // close() 가 커넥션 락을 잡은 뒤 플래그를 세우므로 락 안에서 확인
        if self.is_closed() {
            return Err(BridgeError::SessionUnavailable {
                key: self.key.to_string(),
            });
        }
        debug!(session = self.id, sql_len = sql.len(), "query");
        conn.query(sql)
    }

    /// Close the underlying connection. Idempotent.
    fn release(&self) -> BridgeResult<()> {
        let mut conn = self.conn.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        conn.close().map_err(|err| BridgeError::Release {
            key: self.key.to_string(),
            message: err.to_string(),
        })
    }
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("namespace", &self.namespace)
            .field("schema", &self.schema)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct SlotState<C: Connection> {
    session: Option<Arc<Session<C>>>,
    /// Set once the slot has been removed from the map; a caller that grabbed
    /// the slot before removal must retry against the map.
    evicted: bool,
}

type Slot<C> = Arc<Mutex<SlotState<C>>>;

/// Result of [`SessionRegistry::close_all`].
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Sessions whose connection closed cleanly.
    pub closed: usize,
    /// Sessions whose release failed; they are evicted regardless.
    pub failures: Vec<(ConnectionKey, BridgeError)>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sessions released, cleanly or not.
    pub fn attempted(&self) -> usize {
        self.closed + self.failures.len()
    }
}

/// Owned session cache. Share it behind an `Arc`.
pub struct SessionRegistry<D: Driver> {
    driver: D,
    slots: DashMap<ConnectionKey, Slot<D::Conn>>,
    next_id: AtomicU64,
}

impl<D: Driver> SessionRegistry<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Cache key for `config`.
    pub fn derive_key(&self, config: &ConnectionConfig) -> ConnectionKey {
        ConnectionKey::derive(config)
    }

    /// Cached session for `config`, creating it on a miss.
    ///
    /// A failed creation leaves nothing cached; the next call retries.
    pub fn get_or_create(&self, config: &ConnectionConfig) -> BridgeResult<Arc<Session<D::Conn>>> {
        let key = ConnectionKey::derive(config);
        loop {
            let slot = self.slot(&key);
            let mut state = slot.lock();
            if state.evicted {
                continue;
            }
            if let Some(session) = &state.session {
                return Ok(Arc::clone(session));
            }

            let session = match self.open(&key, config) {
                Ok(session) => Arc::new(session),
                Err(err) => {
                    // 대기 중인 호출자는 evicted 를 보고 새 슬롯으로 재시도한다
                    state.evicted = true;
                    self.slots.remove_if(&key, |_, current| Arc::ptr_eq(current, &slot));
                    return Err(err);
                }
            };
            state.session = Some(Arc::clone(&session));
            return Ok(session);
        }
    }

    /// Cached session for `config`, never creating one.
    pub fn peek(&self, config: &ConnectionConfig) -> Option<Arc<Session<D::Conn>>> {
        let key = ConnectionKey::derive(config);
        let slot = self.slots.get(&key).map(|entry| Arc::clone(entry.value()))?;
        let state = slot.lock();
        if state.evicted {
            return None;
        }
        state.session.clone()
    }

    /// Evict and release the session for `config`.
    ///
    /// Returns `Ok(false)` when nothing was cached. The entry is evicted even
    /// when releasing its connection fails.
    pub fn close(&self, config: &ConnectionConfig) -> BridgeResult<bool> {
        let key = ConnectionKey::derive(config);
        let Some((key, slot)) = self.slots.remove(&key) else {
            return Ok(false);
        };

        match Self::retire(&slot) {
            Some(session) => {
                info!(session = session.id(), key = %key, "closing session");
                session.release()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release every cached session and empty the cache.
    ///
    /// A release failure is logged and recorded in the report; it does not
    /// stop the remaining sessions from being released. Quiesce query
    /// issuance first: sessions created concurrently with the drain are
    /// drained too, and a query holding a connection delays its release.
    pub fn close_all(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let keys: Vec<ConnectionKey> = self.slots.iter().map(|entry| entry.key().clone()).collect();
            if keys.is_empty() {
                break;
            }

            for key in keys {
                let Some((key, slot)) = self.slots.remove(&key) else {
                    continue;
                };
                let Some(session) = Self::retire(&slot) else {
                    continue;
                };
                match session.release() {
                    Ok(()) => report.closed += 1,
                    Err(err) => {
                        warn!(session = session.id(), key = %key, error = %err, "release failed during drain");
                        report.failures.push((key, err));
                    }
                }
            }
        }

        info!(
            closed = report.closed,
            failed = report.failures.len(),
            "session cache drained"
        );
        report
    }

    /// Number of live cached sessions.
    pub fn len(&self) -> usize {
        self.live_slots()
            .iter()
            .filter(|slot| slot.lock().session.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of live cached sessions, sorted.
    pub fn keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|(_, slot)| slot.lock().session.is_some())
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        keys
    }

    /// Sessions created over the registry's lifetime.
    pub fn created_count(&self) -> u64 {
        self.next_id.load(Ordering::Acquire) - 1
    }

    // Map guards are dropped before any slot is locked.
    fn slot(&self, key: &ConnectionKey) -> Slot<D::Conn> {
        if let Some(entry) = self.slots.get(key) {
            return Arc::clone(entry.value());
        }
        let entry = self.slots.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(SlotState {
                session: None,
                evicted: false,
            }))
        });
        Arc::clone(entry.value())
    }

    fn live_slots(&self) -> Vec<Slot<D::Conn>> {
        self.slots.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Mark a removed slot evicted and hand back its session.
    fn retire(slot: &Slot<D::Conn>) -> Option<Arc<Session<D::Conn>>> {
        let mut state = slot.lock();
        state.evicted = true;
        state.session.take()
    }

    #[instrument(level = "debug", skip_all, fields(key = %key))]
    fn open(&self, key: &ConnectionKey, config: &ConnectionConfig) -> BridgeResult<Session<D::Conn>> {
        let mut conn = self.driver.connect(&config.uri)?;
        let namespace = config.effective_namespace().map(str::to_string);
        let schema = config.effective_schema().map(str::to_string);

        if let Err(err) = Self::authenticate(&mut conn, config, namespace.as_deref(), schema.as_deref()) {
            // 부분적으로 열린 커넥션은 캐시하지 않는다
            if let Err(close_err) = conn.close() {
                debug!(error = %close_err, "closing half-open connection failed");
            }
            return Err(err);
        }

        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        info!(
            session = id,
            namespace = namespace.as_deref().unwrap_or_default(),
            schema = schema.as_deref().unwrap_or_default(),
            "session created"
        );

        Ok(Session {
            id,
            key: key.clone(),
            namespace,
            schema,
            created_at: Instant::now(),
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
        })
    }

    fn authenticate(
        conn: &mut D::Conn,
        config: &ConnectionConfig,
        namespace: Option<&str>,
        schema: Option<&str>,
    ) -> BridgeResult<()> {
        conn.signin(&RootCredentials::new(&config.account, &config.password))?;
        if let Some(namespace) = namespace {
            conn.use_ns(namespace)?;
        }
        if let Some(schema) = schema {
            conn.use_db(schema)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::MemoryDriver;

    fn config(uri: &str, account: &str) -> ConnectionConfig {
        ConnectionConfig::new(uri, account, "root")
    }

    #[test]
    fn test_key_delimiter() {
        assert_eq!(
            ConnectionKey::from_parts("ws://localhost:8000/rpc", "root").as_str(),
            "ws://localhost:8000/rpc?username=root"
        );
        assert_eq!(
            ConnectionKey::from_parts("http://db/sql?ns=a", "root").as_str(),
            "http://db/sql?ns=a&username=root"
        );
    }

    #[test]
    fn test_key_ignores_scope() {
        let a = config("ws://db", "root").with_namespace("a").with_schema("x");
        let b = config("ws://db", "root").with_namespace("b");
        assert_eq!(ConnectionKey::derive(&a), ConnectionKey::derive(&b));
    }

    #[test]
    fn test_key_account_cannot_forge_uri() {
        let forged = ConnectionKey::from_parts("h", "x&username=y");
        let real = ConnectionKey::from_parts("h?username=x", "y");
        assert_ne!(forged, real);
    }

    #[test]
    fn test_get_or_create_reuses() {
        let registry = SessionRegistry::new(MemoryDriver::new());
        let first = registry.get_or_create(&config("ws://db", "root")).unwrap();
        let second = registry.get_or_create(&config("ws://db", "root")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.driver().connect_count(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.created_count(), 1);
    }

    #[test]
    fn test_scope_is_sticky() {
        let registry = SessionRegistry::new(MemoryDriver::new());
        let first = registry
            .get_or_create(&config("ws://db", "root").with_namespace("alpha"))
            .unwrap();
        let second = registry
            .get_or_create(&config("ws://db", "root").with_namespace("beta"))
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(second.namespace(), Some("alpha"));
    }

    #[test]
    fn test_failed_creation_caches_nothing() {
        let driver = MemoryDriver::new();
        driver.fail_signin("ws://bad");
        let registry = SessionRegistry::new(driver);

        let err = registry.get_or_create(&config("ws://bad", "root")).unwrap_err();
        assert!(matches!(err, BridgeError::Auth { .. }));
        assert!(registry.peek(&config("ws://bad", "root")).is_none());
        assert!(registry.is_empty());
        // half-open connection was closed
        assert_eq!(registry.driver().close_count(), 1);
    }

    #[test]
    fn test_failed_creation_leaves_no_slot() {
        let driver = MemoryDriver::new();
        driver.fail_connect("ws://down");
        driver.fail_signin("ws://locked");
        let registry = SessionRegistry::new(driver);

        for i in 0..10 {
            let account = format!("user{i}");
            assert!(registry.get_or_create(&config("ws://down", &account)).is_err());
            assert!(registry.get_or_create(&config("ws://locked", &account)).is_err());
        }
        assert_eq!(registry.slots.len(), 0);

        // 실패 후에도 다른 키는 정상 생성
        registry.get_or_create(&config("ws://up", "root")).unwrap();
        assert_eq!(registry.slots.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_then_recreate() {
        let registry = SessionRegistry::new(MemoryDriver::new());
        let cfg = config("ws://db", "root");
        let first = registry.get_or_create(&cfg).unwrap();

        assert!(registry.close(&cfg).unwrap());
        assert!(first.is_closed());
        assert!(!registry.close(&cfg).unwrap());

        let second = registry.get_or_create(&cfg).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.id(), second.id());
        assert!(matches!(
            first.query("SELECT 1"),
            Err(BridgeError::SessionUnavailable { .. })
        ));
    }

    #[test]
    fn test_close_all_continues_after_failure() {
        let driver = MemoryDriver::new();
        driver.fail_close("ws://b");
        let registry = SessionRegistry::new(driver);
        for uri in ["ws://a", "ws://b", "ws://c"] {
            registry.get_or_create(&config(uri, "root")).unwrap();
        }

        let report = registry.close_all();
        assert_eq!(report.closed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0.as_str(), "ws://b?username=root");
        assert!(registry.is_empty());
        assert!(registry.keys().is_empty());
        assert_eq!(registry.driver().close_count(), 3);
    }
}
