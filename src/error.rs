//! Error types for Cuantizar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid reduction axis {axis} for tensor of rank {ndim}")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Quantization parameters are not initialized: {0}")]
    Uninitialized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
