//! Session configuration and the session facade

mod config;
mod connection_string;
mod session;

pub use config::{
    Credentials, SessionConfig, SessionConfigBuilder, SessionSettings, DEFAULT_FETCH_SIZE,
    ENV_DBNAME, ENV_HOST, ENV_PASSWORD, ENV_PORT, ENV_USER,
};
pub use session::Session;
