//! Buffered execution
//!
//! Every statement runs inside its own transaction, and every path ends with
//! `ROLLBACK`, so no transaction outlives a call:
//!
//! ```text
//! rows:    BEGIN; <query>; ROLLBACK
//! command: BEGIN; <query>; COMMIT; ROLLBACK
//! ```
//!
//! Statement failures are never retried. A best-effort `ROLLBACK` leaves the
//! connection reusable before the error is returned.

use super::QueryOutcome;
use crate::connection::Connection;
use crate::driver::DriverConnection;
use crate::metrics::labels;
use crate::{Error, Result};
use std::time::Instant;
use tracing::Instrument;

/// Run `query` on an open connection
pub async fn execute<C: DriverConnection>(
    conn: &mut Connection<C>,
    query: &str,
    expects_results: bool,
) -> Result<QueryOutcome> {
    let mode = if expects_results {
        labels::MODE_BUFFERED
    } else {
        labels::MODE_COMMAND
    };
    let start = Instant::now();

    let result = async {
        conn.execute("BEGIN")
            .await
            .map_err(|e| Error::query("begin", e))?;

        let outcome = match run(conn, query, expects_results).await {
            Ok(outcome) => outcome,
            Err(e) => {
                rollback_quietly(conn).await;
                return Err(e);
            }
        };

        conn.execute("ROLLBACK")
            .await
            .map_err(|e| Error::query("rollback", e))?;
        Ok::<_, Error>(outcome)
    }
    .instrument(tracing::debug_span!("execute", mode))
    .await;

    crate::metrics::histograms::query_duration(mode, start.elapsed().as_millis() as u64);
    match &result {
        Ok(outcome) => {
            if let QueryOutcome::Rows(rows) = outcome {
                crate::metrics::counters::rows_processed(mode, rows.len() as u64);
                tracing::debug!(rows = rows.len(), "query complete");
            }
            crate::metrics::counters::query_completed(mode, labels::STATUS_SUCCESS);
        }
        Err(e) => {
            if let Error::Query { operation, .. } = e {
                crate::metrics::counters::query_error(mode, *operation);
            }
            crate::metrics::counters::query_completed(mode, labels::STATUS_ERROR);
        }
    }
    result
}

async fn run<C: DriverConnection>(
    conn: &mut Connection<C>,
    query: &str,
    expects_results: bool,
) -> Result<QueryOutcome> {
    if expects_results {
        let rows = conn
            .query(query)
            .await
            .map_err(|e| Error::query("execute", e))?;
        Ok(QueryOutcome::Rows(rows))
    } else {
        conn.execute(query)
            .await
            .map_err(|e| Error::query("execute", e))?;
        conn.execute("COMMIT")
            .await
            .map_err(|e| Error::query("commit", e))?;
        Ok(QueryOutcome::Committed)
    }
}

/// Roll back after a failure, logging instead of masking the statement error
pub(crate) async fn rollback_quietly<C: DriverConnection>(conn: &mut Connection<C>) -> bool {
    match conn.execute("ROLLBACK").await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "rollback after failed statement also failed");
            false
        }
    }
}
