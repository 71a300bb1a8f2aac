//! Buffered statement execution

pub(crate) mod executor;

pub use executor::execute;

use crate::row::Row;

/// Result of a buffered execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Every row the statement produced
    Rows(Vec<Row>),
    /// The statement ran without returning results and was committed
    Committed,
}

impl QueryOutcome {
    /// Rows, if results were requested
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Committed => None,
        }
    }

    /// Whether the statement was committed
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}
