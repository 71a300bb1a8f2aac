//! Core connection type

use super::state::ConnectionState;
use crate::driver::{DriverConnection, DriverError, DriverErrorKind};
use crate::row::Row;
use crate::{Error, Result};
use std::fmt;

/// How query results are consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorMode {
    /// Results are materialized client-side in one call
    #[default]
    Buffered,
    /// Results are streamed from a server-side cursor with this name
    Named(String),
}

impl CursorMode {
    /// Create a named mode, rejecting empty names
    pub fn named(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("cursor name must not be empty".into()));
        }
        Ok(Self::Named(name))
    }

    /// Configured cursor name, if any
    pub fn cursor_name(&self) -> Option<&str> {
        match self {
            Self::Buffered => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered => write!(f, "buffered"),
            Self::Named(name) => write!(f, "named({})", name),
        }
    }
}

/// A supervised physical connection
///
/// Holds at most one driver handle. The handle is present exactly when the
/// recorded state is `Open` or `Stale`.
pub struct Connection<C> {
    handle: Option<C>,
    state: ConnectionState,
    mode: CursorMode,
    open_cursor: Option<String>,
}

impl<C> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("open_cursor", &self.open_cursor)
            .finish()
    }
}

impl<C: DriverConnection> Connection<C> {
    /// A connection with no physical link yet
    pub(crate) fn closed(mode: CursorMode) -> Self {
        Self {
            handle: None,
            state: ConnectionState::Closed,
            mode,
            open_cursor: None,
        }
    }

    /// Current state, reporting `Stale` if the driver has noticed the link died
    pub fn state(&self) -> ConnectionState {
        match (self.state, &self.handle) {
            (ConnectionState::Open, Some(handle)) if handle.is_closed() => ConnectionState::Stale,
            (state, _) => state,
        }
    }

    /// Record staleness if the link has died since the last check
    pub(crate) fn detect_staleness(&mut self) -> Result<ConnectionState> {
        let observed = self.state();
        if observed != self.state {
            tracing::debug!("connection went stale");
            self.state.transition(observed)?;
        }
        Ok(self.state)
    }

    /// Cursor mode this connection was acquired for
    pub fn mode(&self) -> &CursorMode {
        &self.mode
    }

    pub(crate) fn set_mode(&mut self, mode: CursorMode) {
        self.mode = mode;
    }

    /// Server-side cursor declared but not yet run to completion
    pub fn open_cursor(&self) -> Option<&str> {
        self.open_cursor.as_deref()
    }

    pub(crate) fn cursor_opened(&mut self, name: &str) {
        self.open_cursor = Some(name.to_string());
    }

    pub(crate) fn cursor_finished(&mut self) {
        self.open_cursor = None;
    }

    /// Install a freshly opened driver handle
    pub(crate) fn attach(&mut self, handle: C) -> Result<()> {
        self.state.transition(ConnectionState::Open)?;
        self.handle = Some(handle);
        self.open_cursor = None;
        Ok(())
    }

    /// Drop a dead handle without a graceful close
    pub(crate) fn discard(&mut self) {
        self.handle = None;
        self.open_cursor = None;
        // Transition to Closed is valid from every state
        let _ = self.state.transition(ConnectionState::Closed);
    }

    /// Gracefully close the link
    ///
    /// Close failures are logged; the connection ends up `Closed` regardless.
    pub(crate) async fn close(&mut self) {
        self.open_cursor = None;
        // Transition to Closed is valid from every state
        let _ = self.state.transition(ConnectionState::Closed);
        if let Some(handle) = self.handle.take() {
            match handle.close().await {
                Ok(()) => tracing::debug!("connection closed"),
                Err(e) => tracing::warn!(error = %e, "error while closing connection"),
            }
        }
    }

    /// Drop the link synchronously (used on `Drop` paths)
    pub(crate) fn release(&mut self) {
        self.open_cursor = None;
        let _ = self.state.transition(ConnectionState::Closed);
        if self.handle.take().is_some() {
            tracing::debug!("connection released");
        }
    }

    fn handle_mut(&mut self) -> std::result::Result<&mut C, DriverError> {
        match (self.state, self.handle.as_mut()) {
            (ConnectionState::Open, Some(handle)) => Ok(handle),
            _ => Err(DriverError::new(
                DriverErrorKind::Transient,
                format!("connection is {}", self.state),
            )),
        }
    }

    /// Run a statement and collect its rows
    pub(crate) async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DriverError> {
        tracing::trace!(sql = %sql, "query");
        self.handle_mut()?.query(sql).await
    }

    /// Run a statement, discarding output
    pub(crate) async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        tracing::trace!(sql = %sql, "execute");
        self.handle_mut()?.execute(sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credentials;
    use crate::driver::{Driver, MemoryBackend};

    async fn open(backend: &MemoryBackend) -> Connection<crate::driver::memory::MemoryConnection> {
        let credentials = Credentials::new("localhost", "db", "user", "pass", 5432);
        let handle = backend.driver().connect(&credentials).await.unwrap();
        let mut conn = Connection::closed(CursorMode::Buffered);
        conn.attach(handle).unwrap();
        conn
    }

    #[test]
    fn test_cursor_mode() {
        assert_eq!(CursorMode::default(), CursorMode::Buffered);
        assert_eq!(CursorMode::Buffered.cursor_name(), None);
        let named = CursorMode::named("stream").unwrap();
        assert_eq!(named.cursor_name(), Some("stream"));
        assert_eq!(named.to_string(), "named(stream)");
        assert!(CursorMode::named("").unwrap_err().is_config());
    }

    #[tokio::test]
    async fn test_attach_opens() {
        let backend = MemoryBackend::new();
        let conn = open(&backend).await;
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_staleness_detected_on_demand() {
        let backend = MemoryBackend::new();
        let mut conn = open(&backend).await;

        backend.kill_connections();
        assert_eq!(conn.state(), ConnectionState::Stale);
        assert_eq!(conn.detect_staleness().unwrap(), ConnectionState::Stale);

        let err = conn.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_close_releases_handle() {
        let backend = MemoryBackend::new();
        let mut conn = open(&backend).await;
        conn.cursor_opened("c");

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.open_cursor(), None);
        assert_eq!(backend.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_discard_closes() {
        let backend = MemoryBackend::new();
        let mut conn = open(&backend).await;

        backend.kill_connections();
        conn.detect_staleness().unwrap();
        conn.discard();

        assert_eq!(conn.state(), ConnectionState::Closed);
        let err = conn.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_release_is_synchronous() {
        let backend = MemoryBackend::new();
        let mut conn = open(&backend).await;
        conn.release();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(backend.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_attach_twice_is_invalid() {
        let backend = MemoryBackend::new();
        let mut conn = open(&backend).await;
        let credentials = Credentials::new("localhost", "db", "user", "pass", 5432);
        let second = backend.driver().connect(&credentials).await.unwrap();
        assert!(matches!(
            conn.attach(second),
            Err(Error::InvalidState { .. })
        ));
    }
}
