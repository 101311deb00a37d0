//! Store client seam.
//!
//! The session cache and executor depend only on [`Driver`] and
//! [`Connection`], never on a concrete transport.
//!
//! # Contract
//!
//! - `Driver::connect`: opens an unauthenticated connection to `uri`.
//! - `Connection::signin`: root-level credentials; must precede scope selection.
//! - `Connection::use_ns` / `use_db`: select the namespace / database every
//!   later statement on this connection runs in.
//! - `Connection::query`: submits the text as-is and returns one result per
//!   statement, in order. Transport failures are errors; statement failures are
//!   reported inside the [`StoreResponse`].
//! - `Connection::close`: releases the transport; called at most once.

pub mod memory;

#[cfg(feature = "http")]
pub mod http;

use crate::error::{BridgeError, BridgeResult};
use crate::value::StoreValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opens connections to an endpoint.
pub trait Driver: Send + Sync {
    type Conn: Connection;

    fn connect(&self, uri: &str) -> BridgeResult<Self::Conn>;
}

/// One live store connection.
pub trait Connection: Send {
    fn signin(&mut self, credentials: &RootCredentials) -> BridgeResult<()>;

    fn use_ns(&mut self, namespace: &str) -> BridgeResult<()>;

    fn use_db(&mut self, database: &str) -> BridgeResult<()>;

    fn query(&mut self, sql: &str) -> BridgeResult<StoreResponse>;

    fn close(&mut self) -> BridgeResult<()>;
}

/// Root user credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCredentials {
    pub user: String,
    pub pass: String,
}

impl RootCredentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

// 비밀번호는 로그에 남기지 않는다
impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// Outcome of one submitted statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementStatus {
    Ok,
    Err(String),
}

/// Result of one statement within a response.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub status: StatementStatus,
    /// Server-reported execution time, e.g. `"1.2ms"`
    pub time: Option<String>,
    pub result: StoreValue,
}

impl StatementResult {
    pub fn ok(result: StoreValue) -> Self {
        Self {
            status: StatementStatus::Ok,
            time: None,
            result,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            status: StatementStatus::Err(message.into()),
            time: None,
            result: StoreValue::None,
        }
    }
}

/// Response to one `query` call: one entry per statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreResponse {
    statements: Vec<StatementResult>,
    sql: String,
}

impl StoreResponse {
    pub fn new(sql: impl Into<String>, statements: Vec<StatementResult>) -> Self {
        Self {
            statements,
            sql: sql.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[StatementResult] {
        &self.statements
    }

    /// Take the result value of statement `index`.
    ///
    /// A failed statement is a [`BridgeError::Query`]; a missing one is a
    /// [`BridgeError::Protocol`].
    pub fn take(&mut self, index: usize) -> BridgeResult<StoreValue> {
        let count = self.statements.len();
        let statement = self.statements.get_mut(index).ok_or_else(|| {
            BridgeError::Protocol(format!(
                "response has {count} statement result(s), wanted #{index}"
            ))
        })?;

        match &statement.status {
            StatementStatus::Ok => Ok(std::mem::replace(&mut statement.result, StoreValue::None)),
            StatementStatus::Err(message) => Err(BridgeError::Query {
                message: message.clone(),
                sql: self.sql.clone(),
            }),
        }
    }
}
