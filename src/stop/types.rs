//! Trailing-stop types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle phase of a trailing stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopPhase {
    /// Holding the fixed initial stop
    Initial,
    /// Activation reached, stop moved to breakeven
    Armed,
    /// Stop follows the best price
    Trailing,
}

impl fmt::Display for StopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopPhase::Initial => write!(f, "initial"),
            StopPhase::Armed => write!(f, "armed"),
            StopPhase::Trailing => write!(f, "trailing"),
        }
    }
}

/// Mutable state of one trailing stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopState {
    pub phase: StopPhase,
    /// Most favorable price seen since arming (entry before that)
    pub best_price: Decimal,
    /// Stop the engine wants in force
    pub current_stop: Decimal,
    /// Last stop confirmed by the exchange
    pub last_applied_stop: Option<Decimal>,
}

/// Trailing-stop errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StopError {
    /// Price tick is zero or negative
    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),
    /// Entry price is zero or negative
    #[error("Invalid entry price: {0}")]
    InvalidEntry(Decimal),
    /// Stop percentages out of range
    #[error("Invalid stop configuration: {0}")]
    InvalidConfig(String),
}
