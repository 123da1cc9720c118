//! Error types for synkge-nn.

use thiserror::Error;

/// Model construction and forward-pass errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The requested head input does not match the model's head source.
    #[error("head source mismatch: {0}")]
    HeadSource(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
