//! Error types shared by every module of the crate.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HmmClimateError {
    /// Bad arguments: empty alphabet, zero length, mismatched lengths, non-finite values.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Fewer observations than hidden states.
    #[error("insufficient data for requested state count: {observations} observations, {states} states")]
    InsufficientData { observations: usize, states: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl HmmClimateError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        HmmClimateError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, HmmClimateError>;
