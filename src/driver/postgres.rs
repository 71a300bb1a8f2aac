//! `tokio-postgres` backed driver

use super::{Driver, DriverConnection, DriverError, DriverErrorKind};
use crate::client::Credentials;
use crate::row::Row;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

/// Default `application_name` reported to the server
const DEFAULT_APPLICATION_NAME: &str = "pg-session";

/// SQLSTATEs that mean "try again later" rather than "you are wrong"
///
/// * class `08`: connection exception
/// * `57P03`: cannot_connect_now (server starting up or in recovery)
/// * `53300`: too_many_connections
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || code == "57P03" || code == "53300"
}

/// Classify a `tokio-postgres` failure
fn classify(context: &str, err: tokio_postgres::Error) -> DriverError {
    let (kind, message) = match err.as_db_error() {
        Some(db) => {
            let kind = if is_transient_sqlstate(db.code().code()) {
                DriverErrorKind::Transient
            } else {
                DriverErrorKind::Fatal
            };
            (
                kind,
                format!(
                    "{}: {}: {} (SQLSTATE {})",
                    context,
                    db.severity(),
                    db.message(),
                    db.code().code()
                ),
            )
        }
        None => {
            let io_failure = std::error::Error::source(&err)
                .map(|s| s.is::<std::io::Error>())
                .unwrap_or(false);
            let kind = if io_failure || err.is_closed() {
                DriverErrorKind::Transient
            } else {
                DriverErrorKind::Fatal
            };
            (kind, format!("{}: {}", context, err))
        }
    };
    DriverError::with_source(kind, message, err)
}

/// Driver for a real Postgres server over plain TCP
///
/// # Examples
///
/// ```no_run
/// use pg_session::driver::PgDriver;
/// use std::time::Duration;
///
/// let driver = PgDriver::new()
///     .connect_timeout(Duration::from_secs(10))
///     .keepalives_idle(Duration::from_secs(300))
///     .application_name("nightly_export");
/// ```
#[derive(Debug, Clone)]
pub struct PgDriver {
    connect_timeout: Option<Duration>,
    keepalives_idle: Option<Duration>,
    application_name: String,
}

impl Default for PgDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PgDriver {
    /// Create a driver with defaults (no connect timeout, OS keepalive)
    pub fn new() -> Self {
        Self {
            connect_timeout: None,
            keepalives_idle: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }

    /// Set the per-attempt TCP connect timeout
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set TCP keepalive idle interval
    pub fn keepalives_idle(mut self, duration: Duration) -> Self {
        self.keepalives_idle = Some(duration);
        self
    }

    /// Set the application name shown in `pg_stat_activity`
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    fn config(&self, credentials: &Credentials) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(credentials.host())
            .port(credentials.port())
            .user(credentials.user())
            .password(credentials.password())
            .dbname(credentials.dbname())
            .application_name(&self.application_name);
        if let Some(timeout) = self.connect_timeout {
            config.connect_timeout(timeout);
        }
        if let Some(idle) = self.keepalives_idle {
            config.keepalives_idle(idle);
        }
        config
    }
}

#[async_trait]
impl Driver for PgDriver {
    type Connection = PgConnection;

    async fn connect(
        &self,
        credentials: &Credentials,
    ) -> std::result::Result<PgConnection, DriverError> {
        let (client, connection) = self
            .config(credentials)
            .connect(NoTls)
            .await
            .map_err(|e| classify("connect", e))?;

        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection terminated with error");
            }
        });

        Ok(PgConnection { client, task })
    }
}

/// Connection opened by [`PgDriver`]
///
/// Dropping it closes the link: the background connection task ends once the
/// client is gone.
pub struct PgConnection {
    client: Client,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

#[async_trait]
impl DriverConnection for PgConnection {
    async fn query(&mut self, sql: &str) -> std::result::Result<Vec<Row>, DriverError> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| classify("query", e))?;

        let mut rows = Vec::new();
        let mut columns: Arc<[String]> = Arc::from(Vec::new());
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let same_shape = columns.len() == row.columns().len()
                    && columns
                        .iter()
                        .zip(row.columns())
                        .all(|(a, b)| a == b.name());
                if !same_shape {
                    columns = row
                        .columns()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect::<Vec<_>>()
                        .into();
                }
                let values = (0..row.len())
                    .map(|idx| row.get(idx).map(str::to_string))
                    .collect();
                rows.push(Row::new(Arc::clone(&columns), values));
            }
        }
        Ok(rows)
    }

    async fn execute(&mut self, sql: &str) -> std::result::Result<(), DriverError> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| classify("execute", e))
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    async fn close(self) -> std::result::Result<(), DriverError> {
        let PgConnection { client, task } = self;
        drop(client);
        task.await.map_err(|e| {
            DriverError::with_source(DriverErrorKind::Fatal, "connection task failed", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_sqlstates() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("08001"));
        assert!(is_transient_sqlstate("57P03"));
        assert!(is_transient_sqlstate("53300"));
        // invalid_password, invalid_catalog_name, syntax_error
        assert!(!is_transient_sqlstate("28P01"));
        assert!(!is_transient_sqlstate("3D000"));
        assert!(!is_transient_sqlstate("42601"));
    }

    #[test]
    fn test_driver_builder() {
        let driver = PgDriver::new()
            .connect_timeout(Duration::from_secs(3))
            .application_name("reporting");
        assert_eq!(driver.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(driver.keepalives_idle, None);
        assert_eq!(driver.application_name, "reporting");
    }

    #[test]
    fn test_default_application_name() {
        assert_eq!(PgDriver::default().application_name, DEFAULT_APPLICATION_NAME);
    }

    #[tokio::test]
    async fn test_connect_refused_is_transient() {
        // Port 1 on localhost is not a Postgres server
        let credentials = Credentials::new("127.0.0.1", "postgres", "postgres", "postgres", 1);
        let driver = PgDriver::new().connect_timeout(Duration::from_secs(2));
        let err = driver.connect(&credentials).await.unwrap_err();
        assert!(err.is_transient(), "unexpected classification: {}", err);
    }
}
