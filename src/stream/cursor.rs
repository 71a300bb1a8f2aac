//! Cursor declaration
//!
//! ```text
//! BEGIN
//! DECLARE "<name>" NO SCROLL CURSOR FOR <query>
//! FETCH FORWARD <fetch_size> FROM "<name>"    -- repeated on demand
//! ROLLBACK                                    -- after the last block
//! ```

use super::row_stream::RowStream;
use crate::connection::Connection;
use crate::driver::DriverConnection;
use crate::metrics::labels;
use crate::query::executor::rollback_quietly;
use crate::{Error, Result};

/// Quote `name` as a SQL identifier
///
/// ```
/// assert_eq!(pg_session::stream::quote_identifier("export"), "\"export\"");
/// assert_eq!(pg_session::stream::quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Declare a cursor for `query` and return a lazy stream over its rows
///
/// The connection must be open and bound to a named cursor mode. Fails with
/// [`Error::Config`] before touching the network otherwise.
pub async fn iterate<'a, C: DriverConnection + 'a>(
    conn: &'a mut Connection<C>,
    query: &str,
    fetch_size: usize,
) -> Result<RowStream<'a>> {
    let name = conn
        .mode()
        .cursor_name()
        .ok_or_else(|| {
            Error::Config(
                "streaming requires a named cursor: configure cursor_name or call set_cursor_name"
                    .into(),
            )
        })?
        .to_string();
    if fetch_size == 0 {
        return Err(Error::Config("fetch_size must be at least 1".into()));
    }

    let quoted = quote_identifier(&name);
    let query = query.trim().trim_end_matches(';').trim_end();

    conn.execute("BEGIN").await.map_err(|e| {
        crate::metrics::counters::query_error(labels::MODE_STREAMING, "begin");
        Error::query("begin", e)
    })?;
    conn.cursor_opened(&name);

    let declare = format!("DECLARE {} NO SCROLL CURSOR FOR {}", quoted, query);
    if let Err(e) = conn.execute(&declare).await {
        if rollback_quietly(conn).await {
            conn.cursor_finished();
        }
        crate::metrics::counters::query_error(labels::MODE_STREAMING, "declare cursor");
        crate::metrics::counters::query_completed(labels::MODE_STREAMING, labels::STATUS_ERROR);
        return Err(Error::query("declare cursor", e));
    }

    tracing::debug!(cursor = %name, fetch_size, "cursor declared");
    Ok(RowStream::new(conn, &quoted, fetch_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Credentials;
    use crate::connection::{ConnectionSupervisor, CursorMode, RetryPolicy};
    use crate::driver::memory::MemoryConnection;
    use crate::driver::MemoryBackend;
    use futures::StreamExt;

    async fn connect(backend: &MemoryBackend, mode: CursorMode) -> Connection<MemoryConnection> {
        ConnectionSupervisor::new(
            backend.driver(),
            Credentials::new("localhost", "db", "user", "pass", 5432),
            RetryPolicy::default(),
        )
        .acquire(mode)
        .await
        .unwrap()
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("stream"), "\"stream\"");
        assert_eq!(quote_identifier("My Cursor"), "\"My Cursor\"");
        assert_eq!(quote_identifier("x\"y"), "\"x\"\"y\"");
    }

    #[tokio::test]
    async fn test_buffered_mode_rejected_without_network() {
        let backend = MemoryBackend::new();
        let mut conn = connect(&backend, CursorMode::Buffered).await;

        let err = iterate(&mut conn, "SELECT 1", 10).await.err().unwrap();
        assert!(err.is_config());
        assert_eq!(backend.statement_count(), 0);
    }

    #[tokio::test]
    async fn test_declares_quoted_cursor() {
        let backend = MemoryBackend::new();
        backend.register_series("SELECT n FROM t", "n", 3);
        let mut conn = connect(&backend, CursorMode::named("My Cursor").unwrap()).await;

        let rows: Vec<_> = iterate(&mut conn, "SELECT n FROM t;", 2)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(rows.len(), 3);
        assert_eq!(
            backend.statements(),
            vec![
                "BEGIN",
                "DECLARE \"My Cursor\" NO SCROLL CURSOR FOR SELECT n FROM t",
                "FETCH FORWARD 2 FROM \"My Cursor\"",
                "FETCH FORWARD 2 FROM \"My Cursor\"",
                "ROLLBACK",
            ]
        );
    }

    #[tokio::test]
    async fn test_declare_failure_is_query_error() {
        let backend = MemoryBackend::new();
        backend.fail_statement("SELECT * FROM missing", "relation \"missing\" does not exist");
        let mut conn = connect(&backend, CursorMode::named("c").unwrap()).await;

        let err = iterate(&mut conn, "SELECT * FROM missing", 10)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Query { operation: "declare cursor", .. }));
        assert_eq!(conn.open_cursor(), None);
        assert!(!backend.in_transaction());
    }
}
