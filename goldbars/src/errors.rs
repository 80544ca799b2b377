use thiserror::Error;

use crate::BarId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Empty candidate set: nothing left to weigh")]
    EmptyCandidateSet,

    #[error("Invalid comparison returned: {0}")]
    InvalidComparison(String),

    #[error("Malformed candidate payload {payload:?}: {reason}")]
    MalformedPayload { payload: String, reason: String },

    #[error("Maximum retry count ({max}): {actual}")]
    AttemptsExceeded { max: u32, actual: u32 },

    #[error("Invalid index provided: {0}")]
    InvalidIndex(BarId),

    #[error("No genuine bar besides suspected fake {0}")]
    NoGenuineItem(BarId),

    #[error("Balance adapter error: {0}")]
    Adapter(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}
