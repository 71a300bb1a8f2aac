//! Lazy row stream over a declared cursor

use crate::connection::Connection;
use crate::driver::DriverConnection;
use crate::metrics::labels;
use crate::query::executor::rollback_quietly;
use crate::row::Row;
use crate::{Error, Result};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

/// Rows of a server-side cursor, fetched one block at a time
///
/// The stream mutably borrows the session, so no other statement can run
/// until it is dropped. Dropping it before the last row leaves the cursor's
/// transaction open on the server; the session discards that connection
/// before its next statement.
pub struct RowStream<'a> {
    inner: BoxStream<'a, Result<Row>>,
}

impl std::fmt::Debug for RowStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").finish_non_exhaustive()
    }
}

struct Fetcher<'a, C> {
    conn: &'a mut Connection<C>,
    fetch: String,
    fetch_size: usize,
    buffer: VecDeque<Row>,
    exhausted: bool,
    /// Failure to report once the buffered rows are handed out
    deferred: Option<Error>,
    rows: u64,
    start: Instant,
}

impl<'a, C: DriverConnection> Fetcher<'a, C> {
    /// Pull the next block; a short block ends the cursor
    async fn fill(&mut self) -> Result<()> {
        let block = match self.conn.query(&self.fetch).await {
            Ok(block) => block,
            Err(e) => {
                self.abort().await;
                return Err(Error::query("fetch", e));
            }
        };

        crate::metrics::histograms::fetch_block_size(block.len() as u64);
        tracing::trace!(rows = block.len(), "fetched block");

        let short = block.len() < self.fetch_size;
        self.rows += block.len() as u64;
        self.buffer.extend(block);

        if short {
            self.exhausted = true;
            if let Err(e) = self.finish().await {
                self.deferred = Some(e);
            }
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if let Err(e) = self.conn.execute("ROLLBACK").await {
            self.record_failure("rollback");
            return Err(Error::query("rollback", e));
        }
        self.conn.cursor_finished();
        Ok(())
    }

    async fn abort(&mut self) {
        if rollback_quietly(self.conn).await {
            self.conn.cursor_finished();
        }
        self.record_failure("fetch");
    }

    fn record_failure(&self, operation: &'static str) {
        crate::metrics::counters::query_error(labels::MODE_STREAMING, operation);
        crate::metrics::counters::query_completed(labels::MODE_STREAMING, labels::STATUS_ERROR);
    }

    fn record_success(&self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        crate::metrics::histograms::query_duration(labels::MODE_STREAMING, elapsed);
        crate::metrics::counters::rows_processed(labels::MODE_STREAMING, self.rows);
        crate::metrics::counters::query_completed(labels::MODE_STREAMING, labels::STATUS_SUCCESS);
        tracing::debug!(rows = self.rows, elapsed_ms = elapsed, "cursor drained");
    }
}

impl<'a> RowStream<'a> {
    pub(crate) fn new<C: DriverConnection + 'a>(
        conn: &'a mut Connection<C>,
        quoted_cursor: &str,
        fetch_size: usize,
    ) -> Self {
        let fetcher = Fetcher {
            conn,
            fetch: format!("FETCH FORWARD {} FROM {}", fetch_size, quoted_cursor),
            fetch_size,
            buffer: VecDeque::with_capacity(fetch_size),
            exhausted: false,
            deferred: None,
            rows: 0,
            start: Instant::now(),
        };

        let inner = futures::stream::try_unfold(fetcher, |mut fetcher| async move {
            loop {
                if let Some(row) = fetcher.buffer.pop_front() {
                    return Ok::<_, Error>(Some((row, fetcher)));
                }
                if let Some(e) = fetcher.deferred.take() {
                    return Err(e);
                }
                if fetcher.exhausted {
                    fetcher.record_success();
                    return Ok(None);
                }
                fetcher.fill().await?;
            }
        });

        Self {
            inner: inner.boxed(),
        }
    }

    /// Drain the remaining rows into a vector
    ///
    /// Convenient for tests and small result sets; defeats the point of
    /// streaming for large ones.
    pub async fn try_collect_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.inner.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl Stream for RowStream<'_> {
    type Item = Result<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
