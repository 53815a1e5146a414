//! Feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::ExchangeError;

/// A single polled price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Local timestamp when the price was read
    pub timestamp: DateTime<Utc>,
}

/// Polling errors, all transient from the loop's point of view
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Read did not finish within the call timeout
    #[error("Feed read timed out")]
    Timeout,
    /// Exchange call failed
    #[error("Feed unavailable: {0}")]
    Unavailable(#[from] ExchangeError),
    /// Exchange reported a non-positive price
    #[error("Exchange reported invalid price {0}")]
    InvalidPrice(Decimal),
}
