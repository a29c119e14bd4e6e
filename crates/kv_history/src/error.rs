use thiserror::Error;

/// Why a history (or one of its events) was rejected.
///
/// Indices refer to the position of the offending event in the input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("history is not a JSON array of events: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event {index}: {source}")]
    InvalidEvent {
        index: usize,
        source: serde_json::Error,
    },

    #[error("event {index}: unknown op {op:?}")]
    UnknownOp { index: usize, op: String },

    #[error("event {index}: invalid {field} for {op}: {source}")]
    InvalidField {
        index: usize,
        op: &'static str,
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("event {index}: unexpected result for clear: {result}")]
    UnexpectedResult {
        index: usize,
        result: serde_json::Value,
    },

    #[error("event {index}: {op} completed without a result")]
    MissingResult { index: usize, op: &'static str },

    #[error("event {index}: unrecognized completion {value:?}")]
    InvalidEnd { index: usize, value: String },

    #[error("event {index}: timestamp {value} is not finite")]
    NonFiniteTimestamp { index: usize, value: f64 },

    #[error("event {index}: ends at {end} before it starts at {start}")]
    InvalidInterval { index: usize, start: f64, end: f64 },

    #[error("ticket {0} is unknown or already completed")]
    UnknownTicket(u64),
}
