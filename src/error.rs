use thiserror::Error;

/// Errors raised by the scheduling core.
///
/// Failing to find a replacement activity is not an error; it shows up as a
/// `None` from the selector or a blocked conflict in the planner outcome.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Malformed input; the caller must fix it before retrying.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The grid no longer matches what the plan was built from.
    #[error("stale plan: bunk {bunk} at slot {slot} is no longer at {expected}")]
    StalePlan {
        bunk: String,
        slot: usize,
        expected: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CascadeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Errors from assignment stores and input files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer saved this day after our snapshot was taken.
    #[error("stale snapshot for {date}: expected version {expected}, store has {actual}")]
    StaleSnapshot {
        date: String,
        expected: u64,
        actual: u64,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = CascadeError> = std::result::Result<T, E>;
