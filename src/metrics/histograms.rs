//! Histogram metrics

/// Time from first attempt to an open connection
pub fn acquire_duration(duration_ms: u64) {
    ::metrics::histogram!("pg_session_acquire_duration_ms").record(duration_ms as f64);
}

/// Time spent on a statement, including result transfer
pub fn query_duration(mode: &'static str, duration_ms: u64) {
    ::metrics::histogram!("pg_session_query_duration_ms", "mode" => mode)
        .record(duration_ms as f64);
}

/// Rows returned by one `FETCH`
pub fn fetch_block_size(rows: u64) {
    ::metrics::histogram!("pg_session_fetch_block_rows").record(rows as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histograms_without_recorder() {
        acquire_duration(12);
        query_duration(crate::metrics::labels::MODE_COMMAND, 3);
        fetch_block_size(2000);
    }
}
