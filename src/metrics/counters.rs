//! Counter metrics

/// A connection attempt started
pub fn connect_attempted() {
    ::metrics::counter!("pg_session_connect_attempts_total").increment(1);
}

/// A connection attempt succeeded
pub fn connect_succeeded() {
    ::metrics::counter!("pg_session_connect_successes_total").increment(1);
}

/// A connection attempt failed
pub fn connect_failed(reason: &'static str) {
    ::metrics::counter!("pg_session_connect_failures_total", "reason" => reason).increment(1);
}

/// A connection was replaced
pub fn reconnected(reason: &'static str) {
    ::metrics::counter!("pg_session_reconnects_total", "reason" => reason).increment(1);
}

/// A statement finished
pub fn query_completed(mode: &'static str, status: &'static str) {
    ::metrics::counter!("pg_session_queries_total", "mode" => mode, "status" => status)
        .increment(1);
}

/// A statement failed during `operation`
pub fn query_error(mode: &'static str, operation: &'static str) {
    ::metrics::counter!(
        "pg_session_query_errors_total",
        "mode" => mode,
        "operation" => operation
    )
    .increment(1);
}

/// Rows handed to the caller
pub fn rows_processed(mode: &'static str, count: u64) {
    ::metrics::counter!("pg_session_rows_total", "mode" => mode).increment(count);
}
