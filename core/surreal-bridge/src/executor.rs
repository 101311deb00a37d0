//! Query execution pipeline.
//!
//! ```text
//! ConnectionConfig + SQL → SessionRegistry → Session::query
//!     → first statement result → Normalizer → ResultBatch
//!     → (reads)  primary record (+ @RAW@LIST)
//!     → (writes) OutcomeEnvelope
//! ```
//!
//! Errors are surfaced as-is; nothing here retries, and a failed query never
//! evicts its session.

use crate::config::{ConnectionConfig, ExecutorOptions};
use crate::driver::Driver;
use crate::error::{BridgeError, BridgeResult};
use crate::normalize::{GenericRecord, Normalizer, ResultBatch};
use crate::outcome::{self, OutcomeEnvelope};
use crate::session::{ConnectionKey, Session, SessionRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Runs ORM statements against cached sessions.
pub struct QueryExecutor<D: Driver> {
    registry: Arc<SessionRegistry<D>>,
    options: ExecutorOptions,
}

impl<D: Driver> Clone for QueryExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            options: self.options,
        }
    }
}

impl<D: Driver> QueryExecutor<D> {
    pub fn new(registry: Arc<SessionRegistry<D>>) -> Self {
        Self::with_options(registry, ExecutorOptions::default())
    }

    pub fn with_options(registry: Arc<SessionRegistry<D>>, options: ExecutorOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<D>> {
        &self.registry
    }

    /// Session for `config`: created on a miss when `auto_create_session` is
    /// on, otherwise only an already cached one.
    pub fn session(&self, config: &ConnectionConfig) -> BridgeResult<Arc<Session<D::Conn>>> {
        if self.options.auto_create_session {
            return self.registry.get_or_create(config);
        }
        self.registry
            .peek(config)
            .ok_or_else(|| BridgeError::SessionUnavailable {
                key: ConnectionKey::derive(config).to_string(),
            })
    }

    /// Entry point: reads return the primary record, writes the outcome.
    pub fn execute(&self, config: &ConnectionConfig, sql: &str) -> BridgeResult<GenericRecord> {
        if config.method.is_query() {
            return self.exec_query(config, sql);
        }
        Ok(self.execute_update(None, config, sql)?.into_record())
    }

    /// Read: first record (empty if none) plus all records under
    /// `@RAW@LIST` when there are several.
    pub fn exec_query(&self, config: &ConnectionConfig, sql: &str) -> BridgeResult<GenericRecord> {
        Ok(self.run_query(None, config, sql)?.into_primary())
    }

    /// Run `sql` and decode the first statement's result set.
    ///
    /// Uses `session` when given, otherwise resolves one from `config`.
    pub fn run_query(
        &self,
        session: Option<&Session<D::Conn>>,
        config: &ConnectionConfig,
        sql: &str,
    ) -> BridgeResult<ResultBatch> {
        let resolved: Arc<Session<D::Conn>>;
        let session = match session {
            Some(session) => session,
            None => {
                resolved = self.session(config)?;
                &*resolved
            }
        };

        let started = Instant::now();
        let mut response = session.query(sql)?;
        if response.len() > 1 {
            debug!(
                session = session.id(),
                statements = response.len(),
                "reading first statement result only"
            );
        }
        let result = response.take(0)?;
        let batch = Normalizer::from_options(&self.options).decode_rows(&result)?;

        debug!(
            session = session.id(),
            rows = batch.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "query finished"
        );
        Ok(batch)
    }

    /// Write: run `sql`, then synthesize the outcome from the request.
    pub fn execute_update(
        &self,
        session: Option<&Session<D::Conn>>,
        config: &ConnectionConfig,
        sql: &str,
    ) -> BridgeResult<OutcomeEnvelope> {
        let batch = self.run_query(session, config, sql)?;
        Ok(outcome::synthesize(config.method, config, Some(batch.len())))
    }

    /// Write returning only the affected-row count.
    pub fn exec_update(&self, config: &ConnectionConfig, sql: &str) -> BridgeResult<usize> {
        Ok(self.execute_update(None, config, sql)?.count())
    }
}
