//! Error types

use crate::driver::DriverError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (credentials, cursor name, fetch size)
    ///
    /// Always raised before any network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection acquisition failed
    ///
    /// Raised once the retry budget is exhausted, or immediately when the
    /// server rejects the attempt outright (bad password, unknown database).
    #[error("unable to connect to postgres after {attempts} attempt(s): {source}")]
    Connection {
        /// Number of attempts made before giving up
        attempts: u32,
        /// Last underlying failure
        #[source]
        source: DriverError,
    },

    /// Statement execution failed
    #[error("{operation} failed: {source}")]
    Query {
        /// Operation that was running (e.g. "execute", "declare cursor")
        operation: &'static str,
        /// Underlying driver failure
        #[source]
        source: DriverError,
    },

    /// Invalid connection state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl Error {
    /// Wrap a driver failure raised while running `operation`
    pub(crate) fn query(operation: &'static str, source: DriverError) -> Self {
        Self::Query { operation, source }
    }

    /// Whether this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this is a connection-acquisition error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Whether this is a statement execution error
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
