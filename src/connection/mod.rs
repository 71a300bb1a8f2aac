//! Connection management
//!
//! This module handles:
//! * Connection lifecycle (acquire, staleness detection, rebind, close)
//! * State machine enforcement
//! * Retry policy for acquisition

mod conn;
mod state;
mod supervisor;

pub use conn::{Connection, CursorMode};
pub use state::ConnectionState;
pub use supervisor::{ConnectionSupervisor, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
