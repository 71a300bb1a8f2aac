//! Connection acquisition with retry and reconnect-on-staleness

use super::conn::{Connection, CursorMode};
use super::state::ConnectionState;
use crate::client::Credentials;
use crate::driver::Driver;
use crate::metrics::labels;
use crate::{Error, Result};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Default number of connection attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default delay between failed attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fixed-interval retry policy for connection acquisition
///
/// Only transient connectivity failures are retried. With the defaults a
/// server that never comes up costs 10 attempts and 45 seconds of waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait between a failed attempt and the next one
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Worst-case time spent waiting before giving up
    pub fn total_delay(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Owns the driver and credentials; opens, validates and replaces connections
pub struct ConnectionSupervisor<D: Driver> {
    driver: D,
    credentials: Credentials,
    policy: RetryPolicy,
}

impl<D: Driver> std::fmt::Debug for ConnectionSupervisor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("credentials", &self.credentials)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<D: Driver> ConnectionSupervisor<D> {
    /// Create a supervisor
    pub fn new(driver: D, credentials: Credentials, policy: RetryPolicy) -> Self {
        Self {
            driver,
            credentials,
            policy,
        }
    }

    /// Credentials used for every attempt
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Open a new connection for `mode`, retrying transient failures
    pub async fn acquire(&self, mode: CursorMode) -> Result<Connection<D::Connection>> {
        let mut conn = Connection::closed(mode);
        let handle = self.connect(conn.mode()).await?;
        conn.attach(handle)?;
        Ok(conn)
    }

    /// Make sure `conn` is usable, transparently reacquiring a closed or stale link
    pub async fn ensure_open(&self, conn: &mut Connection<D::Connection>) -> Result<()> {
        match conn.detect_staleness()? {
            ConnectionState::Open => Ok(()),
            state => {
                tracing::info!(state = %state, "connection not usable, reconnecting");
                crate::metrics::counters::reconnected(labels::RECONNECT_STALE);
                conn.discard();
                let handle = self.connect(conn.mode()).await?;
                conn.attach(handle)
            }
        }
    }

    /// Close `conn` (discarding any server-side cursor) and reopen it for `mode`
    pub async fn rebind(
        &self,
        conn: &mut Connection<D::Connection>,
        mode: CursorMode,
    ) -> Result<()> {
        tracing::debug!(from = %conn.mode(), to = %mode, "rebinding connection");
        crate::metrics::counters::reconnected(labels::RECONNECT_REBIND);
        conn.close().await;
        conn.set_mode(mode);
        let handle = self.connect(conn.mode()).await?;
        conn.attach(handle)
    }

    /// Retry loop around a single driver connect
    async fn connect(&self, mode: &CursorMode) -> Result<D::Connection> {
        let policy = self.policy;
        async {
            let start = Instant::now();
            let mut attempt = 0u32;

            loop {
                attempt += 1;
                crate::metrics::counters::connect_attempted();

                match self.driver.connect(&self.credentials).await {
                    Ok(handle) => {
                        tracing::info!(attempt, "connection established");
                        crate::metrics::counters::connect_succeeded();
                        crate::metrics::histograms::acquire_duration(
                            start.elapsed().as_millis() as u64,
                        );
                        return Ok(handle);
                    }
                    Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                        tracing::warn!(
                            attempt,
                            max_attempts = policy.max_attempts,
                            error = %e,
                            "connection attempt failed, retrying in {:?}",
                            policy.delay
                        );
                        crate::metrics::counters::connect_failed(labels::REASON_TRANSIENT);
                        tokio::time::sleep(policy.delay).await;
                    }
                    Err(e) => {
                        let reason = if e.is_transient() {
                            labels::REASON_EXHAUSTED
                        } else {
                            labels::REASON_FATAL
                        };
                        tracing::error!(attempt, reason, error = %e, "unable to connect to postgres");
                        crate::metrics::counters::connect_failed(reason);
                        return Err(Error::Connection {
                            attempts: attempt,
                            source: e,
                        });
                    }
                }
            }
        }
        .instrument(tracing::info_span!(
            "acquire",
            host = %self.credentials.host(),
            port = self.credentials.port(),
            database = %self.credentials.dbname(),
            mode = %mode
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryBackend, MemoryDriver};

    fn supervisor(backend: &MemoryBackend) -> ConnectionSupervisor<MemoryDriver> {
        ConnectionSupervisor::new(
            backend.driver(),
            Credentials::new("localhost", "db", "user", "pass", 5432),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert_eq!(policy.total_delay(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_first_attempt() {
        let backend = MemoryBackend::new();
        let start = tokio::time::Instant::now();
        let conn = supervisor(&backend).acquire(CursorMode::Buffered).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(backend.connect_attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_binds_mode() {
        let backend = MemoryBackend::new();
        let mode = CursorMode::named("stream").unwrap();
        let conn = supervisor(&backend).acquire(mode.clone()).await.unwrap();
        assert_eq!(conn.mode(), &mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_not_retried() {
        let backend = MemoryBackend::new();
        backend.reject_connections("database \"db\" does not exist");
        let start = tokio::time::Instant::now();

        let err = supervisor(&backend)
            .acquire(CursorMode::Buffered)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection { attempts: 1, .. }));
        assert_eq!(backend.connect_attempts(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_open_keeps_live_connection() {
        let backend = MemoryBackend::new();
        let supervisor = supervisor(&backend);
        let mut conn = supervisor.acquire(CursorMode::Buffered).await.unwrap();

        supervisor.ensure_open(&mut conn).await.unwrap();
        assert_eq!(backend.connections_opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_open_replaces_stale_connection() {
        let backend = MemoryBackend::new();
        let supervisor = supervisor(&backend);
        let mut conn = supervisor.acquire(CursorMode::Buffered).await.unwrap();

        backend.kill_connections();
        supervisor.ensure_open(&mut conn).await.unwrap();

        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(backend.connections_opened(), 2);
        assert_eq!(backend.open_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_switches_mode() {
        let backend = MemoryBackend::new();
        let supervisor = supervisor(&backend);
        let mut conn = supervisor.acquire(CursorMode::Buffered).await.unwrap();

        let mode = CursorMode::named("stream").unwrap();
        supervisor.rebind(&mut conn, mode.clone()).await.unwrap();

        assert_eq!(conn.mode(), &mode);
        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(backend.connections_opened(), 2);
        assert_eq!(backend.open_connections(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_failure_leaves_connection_closed() {
        let backend = MemoryBackend::new();
        let supervisor = ConnectionSupervisor::new(
            backend.driver(),
            Credentials::new("localhost", "db", "user", "pass", 5432),
            RetryPolicy::new(2, Duration::from_secs(1)),
        );
        let mut conn = supervisor.acquire(CursorMode::Buffered).await.unwrap();

        backend.refuse_all_connections();
        let err = supervisor
            .rebind(&mut conn, CursorMode::Buffered)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection { attempts: 2, .. }));
        assert_eq!(conn.state(), ConnectionState::Closed);

        // Recovers once the server is back
        backend.accept_connections();
        supervisor.ensure_open(&mut conn).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reconnect_leaves_connection_closed() {
        let backend = MemoryBackend::new();
        let supervisor = ConnectionSupervisor::new(
            backend.driver(),
            Credentials::new("localhost", "db", "user", "pass", 5432),
            RetryPolicy::new(2, Duration::from_secs(1)),
        );
        let mut conn = supervisor.acquire(CursorMode::Buffered).await.unwrap();

        backend.kill_connections();
        backend.refuse_all_connections();
        let err = supervisor.ensure_open(&mut conn).await.unwrap_err();

        assert!(matches!(err, Error::Connection { attempts: 2, .. }));
        assert_eq!(conn.state(), ConnectionState::Closed);

        backend.accept_connections();
        supervisor.ensure_open(&mut conn).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
    }
}
