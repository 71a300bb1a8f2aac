//! Session configuration and credential resolution
//!
//! Every credential field resolves the same way: a value given explicitly
//! (builder or URL) wins, otherwise the environment variable is used,
//! otherwise resolution fails with [`Error::Config`]. An explicit empty string
//! is still a value.

use crate::connection::{CursorMode, RetryPolicy};
use crate::{Error, Result};
use std::fmt;

/// Environment variable holding the server host
pub const ENV_HOST: &str = "db_host";
/// Environment variable holding the database name
pub const ENV_DBNAME: &str = "db_name";
/// Environment variable holding the user name
pub const ENV_USER: &str = "db_user";
/// Environment variable holding the password
pub const ENV_PASSWORD: &str = "db_password";
/// Environment variable holding the port
pub const ENV_PORT: &str = "db_port";

/// Rows requested per `FETCH` when streaming (default)
pub const DEFAULT_FETCH_SIZE: usize = 2000;

/// Fully resolved connection credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    host: String,
    dbname: String,
    user: String,
    password: String,
    port: u16,
}

impl Credentials {
    /// Create credentials from explicit values
    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
            port,
        }
    }

    /// Server host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Database name
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// User name
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Unresolved session configuration
///
/// Use [`SessionConfig::builder()`] or [`SessionConfig::from_url()`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Server host
    pub host: Option<String>,
    /// Database name
    pub dbname: Option<String>,
    /// User name
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Server port
    pub port: Option<u16>,
    /// Server-side cursor name; enables streaming
    pub cursor_name: Option<String>,
    /// Rows per `FETCH` when streaming (default: 2000)
    pub fetch_size: Option<usize>,
    /// Connection acquisition retry policy (default: 10 attempts, 5 seconds apart)
    pub retry_policy: Option<RetryPolicy>,
}

/// Configuration after resolution, ready to open a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Resolved credentials
    pub credentials: Credentials,
    /// Initial cursor mode
    pub cursor_mode: CursorMode,
    /// Rows per `FETCH` when streaming
    pub fetch_size: usize,
    /// Acquisition retry policy
    pub retry_policy: RetryPolicy,
}

impl SessionConfig {
    /// Create a builder
    ///
    /// # Examples
    ///
    /// ```
    /// use pg_session::SessionConfig;
    ///
    /// let config = SessionConfig::builder()
    ///     .host("localhost")
    ///     .dbname("analytics")
    ///     .user("reporter")
    ///     .password("secret")
    ///     .port(5432)
    ///     .cursor_name("export")
    ///     .build();
    /// assert_eq!(config.cursor_name.as_deref(), Some("export"));
    /// ```
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Parse a `postgres://` URL
    ///
    /// Parts missing from the URL fall back to the environment at resolution.
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(super::connection_string::parse(url)?.build())
    }

    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<SessionSettings> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against a custom environment lookup
    pub fn resolve_with<F>(&self, env: F) -> Result<SessionSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let field = |explicit: &Option<String>, key: &str| -> Result<String> {
            explicit
                .clone()
                .or_else(|| env(key))
                .ok_or_else(|| Error::Config(format!("no database credentials found: {} is not set", key)))
        };

        let host = field(&self.host, ENV_HOST)?;
        let dbname = field(&self.dbname, ENV_DBNAME)?;
        let user = field(&self.user, ENV_USER)?;
        let password = field(&self.password, ENV_PASSWORD)?;
        let port = match self.port {
            Some(port) => port,
            None => {
                let raw = field(&None, ENV_PORT)?;
                raw.trim().parse::<u16>().map_err(|_| {
                    Error::Config(format!("invalid {} '{}': expected a port number", ENV_PORT, raw))
                })?
            }
        };

        let cursor_mode = match &self.cursor_name {
            Some(name) => CursorMode::named(name.clone())?,
            None => CursorMode::Buffered,
        };

        let fetch_size = self.fetch_size.unwrap_or(DEFAULT_FETCH_SIZE);
        if fetch_size == 0 {
            return Err(Error::Config("fetch_size must be at least 1".into()));
        }

        let retry_policy = self.retry_policy.unwrap_or_default();
        if retry_policy.max_attempts == 0 {
            return Err(Error::Config(
                "retry policy must allow at least one attempt".into(),
            ));
        }

        Ok(SessionSettings {
            credentials: Credentials::new(host, dbname, user, password, port),
            cursor_mode,
            fetch_size,
            retry_policy,
        })
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Set the database name
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.config.dbname = Some(dbname.into());
        self
    }

    /// Set the user name
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = Some(user.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Configure a server-side cursor name, enabling streaming
    pub fn cursor_name(mut self, name: impl Into<String>) -> Self {
        self.config.cursor_name = Some(name.into());
        self
    }

    /// Set the number of rows requested per `FETCH`
    pub fn fetch_size(mut self, rows: usize) -> Self {
        self.config.fetch_size = Some(rows);
        self
    }

    /// Override the acquisition retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = Some(policy);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
