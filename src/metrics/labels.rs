//! Label values shared by counters and histograms

/// Buffered execution returning rows
pub const MODE_BUFFERED: &str = "buffered";
/// Buffered execution without results (committed)
pub const MODE_COMMAND: &str = "command";
/// Server-side cursor streaming
pub const MODE_STREAMING: &str = "streaming";

/// Statement completed
pub const STATUS_SUCCESS: &str = "success";
/// Statement failed
pub const STATUS_ERROR: &str = "error";

/// Connect attempt failed, will retry
pub const REASON_TRANSIENT: &str = "transient";
/// Connect attempt rejected, no retry
pub const REASON_FATAL: &str = "fatal";
/// Retry budget used up
pub const REASON_EXHAUSTED: &str = "exhausted";

/// Reconnect after finding the link closed or stale
pub const RECONNECT_STALE: &str = "stale";
/// Reconnect requested by a mode switch or cursor cleanup
pub const RECONNECT_REBIND: &str = "rebind";
