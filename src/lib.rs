//! pg-session: a supervised PostgreSQL session
//!
//! One [`Session`] owns one physical connection and keeps it usable:
//!
//! * **Acquisition with retry**: transient connectivity failures are retried
//!   on a fixed interval (10 attempts, 5 seconds apart by default); outright
//!   rejections fail immediately.
//! * **Staleness recovery**: a dropped or timed-out connection is replaced
//!   transparently before the next statement.
//! * **Buffered execution**: every statement runs in its own transaction
//!   that never outlives the call.
//! * **Streaming**: with a cursor name configured, [`Session::iterate`] reads
//!   through a server-side cursor, holding at most one block of rows in
//!   memory.
//! * **Scoped lifecycle**: [`Session::scoped`] closes the connection when the
//!   block ends, on success and on error.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> pg_session::Result<()> {
//! use futures::TryStreamExt;
//! use pg_session::{Session, SessionConfig};
//!
//! let config = SessionConfig::builder()
//!     .host("localhost")
//!     .dbname("analytics")
//!     .cursor_name("export")
//!     .build();
//! let mut session = Session::connect(config).await?;
//!
//! session.command("UPDATE jobs SET state = 'running' WHERE id = 7").await?;
//!
//! let mut rows = session.iterate("SELECT * FROM events").await?;
//! while let Some(row) = rows.try_next().await? {
//!     println!("{:?}", row.get_by_name("id"));
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod connection;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod query;
pub mod row;
pub mod stream;

pub use client::{Credentials, Session, SessionConfig};
pub use connection::{ConnectionState, CursorMode, RetryPolicy};
pub use error::{Error, Result};
pub use query::QueryOutcome;
pub use row::Row;
pub use stream::RowStream;
