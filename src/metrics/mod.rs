//! Metrics collection
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) facade. Nothing
//! is recorded unless the application installs a recorder (Prometheus
//! exporter, statsd, ...).
//!
//! Metric names:
//! * `pg_session_connect_attempts_total`
//! * `pg_session_connect_successes_total`
//! * `pg_session_connect_failures_total{reason}`
//! * `pg_session_reconnects_total{reason}`
//! * `pg_session_queries_total{mode, status}`
//! * `pg_session_query_errors_total{mode, operation}`
//! * `pg_session_rows_total{mode}`
//! * `pg_session_acquire_duration_ms`
//! * `pg_session_query_duration_ms{mode}`
//! * `pg_session_fetch_block_rows`

pub mod counters;
pub mod histograms;
pub mod labels;
