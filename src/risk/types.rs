//! Sizing types

use thiserror::Error;

/// Quantity sizing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SizingError {
    /// Instrument step is not positive
    #[error("Invalid instrument spec for {0}")]
    InvalidSpec(String),
    /// Notional or price is not positive
    #[error("Invalid sizing input: {0}")]
    InvalidInput(String),
}
