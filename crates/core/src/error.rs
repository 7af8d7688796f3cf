use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid page address: {0:?}")]
    InvalidAddress(String),

    #[error("invalid address pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
