//! # surreal-bridge: ORM execution layer for SurrealDB
//!
//! Lets a generic ORM query engine run its generated statements against
//! SurrealDB, a namespace/database-scoped store reached through one
//! connection per endpoint.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use surreal_bridge::driver::memory::MemoryDriver;
//! use surreal_bridge::value::StoreValue;
//! use surreal_bridge::{ConnectionConfig, QueryExecutor, SessionRegistry};
//!
//! # fn main() -> surreal_bridge::BridgeResult<()> {
//! let driver = MemoryDriver::new();
//! driver.respond(
//!     "SELECT * FROM person",
//!     vec![StoreValue::object([("name", StoreValue::from("Tobie"))])],
//! );
//!
//! let registry = Arc::new(SessionRegistry::new(driver));
//! let executor = QueryExecutor::new(Arc::clone(&registry));
//!
//! let config = ConnectionConfig::new("ws://localhost:8000/rpc", "root", "root");
//! let record = executor.execute(&config, "SELECT * FROM person")?;
//! assert_eq!(record["name"], "Tobie");
//!
//! // 종료 시 모든 세션 정리
//! let report = registry.close_all();
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! ConnectionConfig + SQL → SessionRegistry (get-or-create) → Session::query
//!     → first statement result → Normalizer → ResultBatch
//!     → read:  primary record (+ "@RAW@LIST" when several rows)
//!     → write: OutcomeEnvelope { ok, code, msg, count, id / id[] }
//! ```
//!
//! ## Modules
//!
//! - [`scope`]: namespace / schema defaults and SQL-facing suppression
//! - [`session`]: session cache keyed by URI + account ([`SessionRegistry`])
//! - [`executor`]: query execution entry points ([`QueryExecutor`])
//! - [`normalize`]: store value → ordered JSON record decoding
//! - [`outcome`]: write outcome (affected count) synthesis
//! - [`driver`]: store client seam, in-memory driver, optional HTTP driver
//! - [`value`]: store value model

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod logging;
pub mod normalize;
pub mod outcome;
pub mod scope;
pub mod session;
pub mod value;

pub use config::{ArrayDecoding, ConnectionConfig, DatabaseKind, ExecutorOptions, RequestMethod, ScopeDefaults};
pub use error::{BridgeError, BridgeResult};
pub use executor::QueryExecutor;
pub use normalize::{GenericRecord, RAW_LIST_KEY, ResultBatch};
pub use outcome::OutcomeEnvelope;
pub use session::{ConnectionKey, DrainReport, Session, SessionRegistry};
