//! Database driver abstraction
//!
//! The session never speaks the wire protocol itself. It runs plain SQL text
//! through a [`DriverConnection`] opened by an injected [`Driver`]:
//!
//! * [`PgDriver`] talks to a real server through `tokio-postgres`
//! * `MemoryDriver` is a scripted in-process backend for tests and benchmarks,
//!   available with the `testing` feature

#[cfg(any(test, feature = "testing"))]
pub mod memory;
mod postgres;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryBackend, MemoryDriver};
pub use postgres::PgDriver;

use crate::client::Credentials;
use crate::row::Row;
use async_trait::async_trait;
use std::fmt;

/// Opens physical connections
#[async_trait]
pub trait Driver: Send + Sync {
    /// Connection handle produced by this driver
    type Connection: DriverConnection;

    /// Open one physical connection (a single attempt, no retry)
    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<Self::Connection, DriverError>;
}

/// A live physical connection
#[async_trait]
pub trait DriverConnection: Send {
    /// Run one statement and collect the rows it returns
    ///
    /// Statements that produce no result set return an empty vector.
    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DriverError>;

    /// Run a statement whose output is discarded
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError>;

    /// Whether the link is known to be closed (dropped, timed out, terminated)
    fn is_closed(&self) -> bool;

    /// Gracefully close the link
    async fn close(self) -> std::result::Result<(), DriverError>;
}

/// How a driver failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Connectivity failure expected to resolve on its own (server not ready,
    /// connection refused, network drop). Retried during acquisition.
    Transient,
    /// Anything else: authentication, unknown database, bad SQL, constraint
    /// violations. Never retried.
    Fatal,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Failure reported by a driver
#[derive(Debug)]
pub struct DriverError {
    kind: DriverErrorKind,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DriverError {
    /// Create an error without an underlying cause
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause
    pub fn with_source(
        kind: DriverErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Failure classification
    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    /// Whether the acquisition loop may retry after this failure
    pub fn is_transient(&self) -> bool {
        self.kind == DriverErrorKind::Transient
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
