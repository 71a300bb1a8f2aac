//! Server-side cursor streaming
//!
//! Results are pulled from a named cursor in blocks of `fetch_size` rows as
//! the consumer asks for them, so client memory holds at most one block no
//! matter how large the result set is.

mod cursor;
mod row_stream;

pub use cursor::{iterate, quote_identifier};
pub use row_stream::RowStream;
