//! Execution types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::ExchangeError;
use crate::feed::FeedError;
use crate::market::ResolveError;
use crate::risk::SizingError;

/// A stop the exchange is known to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmed {
    /// Stop price after tick rounding
    pub stop_price: Decimal,
    /// Take-profit after tick rounding, when one was requested
    pub take_profit: Option<Decimal>,
    /// True when the exchange already held this stop and no write was sent
    pub skipped: bool,
}

/// Protective-stop update failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayFailure {
    /// Exchange refused the stop
    #[error("Stop rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    /// Exchange throttled the request
    #[error("Rate limited")]
    RateLimited,
    /// Position no longer open
    #[error("Position gone")]
    PositionGone,
    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayFailure {
    /// Failures worth another attempt within the same tick
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayFailure::RateLimited | GatewayFailure::Transport(_))
    }
}

impl From<ExchangeError> for GatewayFailure {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::RateLimited => GatewayFailure::RateLimited,
            ExchangeError::Api { code, message } => {
                if code == crate::exchange::RET_RATE_LIMITED {
                    GatewayFailure::RateLimited
                } else {
                    GatewayFailure::Rejected { code, message }
                }
            }
            other => GatewayFailure::Transport(other.to_string()),
        }
    }
}

/// Entry order errors
#[derive(Debug, Error)]
pub enum EntryError {
    /// A position is already open for the symbol
    #[error("Position already open for {0}")]
    AlreadyOpen(String),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Sizing(#[from] SizingError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    /// Exchange refused the market order
    #[error("Order rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    /// Order accepted but no position appeared
    #[error("No position appeared for {0} after the order")]
    NotFilled(String),
}
