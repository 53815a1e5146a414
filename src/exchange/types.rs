//! Exchange types

use crate::risk::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bybit return code for a successful call
pub const RET_OK: i64 = 0;
/// Bybit return code when too many requests were sent
pub const RET_RATE_LIMITED: i64 = 10006;
/// Bybit return code when a trading-stop call would not change anything
pub const RET_NOT_MODIFIED: i64 = 34040;

/// Lot and price filters for a listed instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentLimits {
    /// Minimum order quantity
    pub min_qty: Decimal,
    /// Order quantity increment
    pub qty_step: Decimal,
    /// Price increment
    pub tick_size: Decimal,
}

/// Open position as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Trading symbol
    pub symbol: String,
    /// Position direction
    pub side: Side,
    /// Average entry price
    pub entry_price: Decimal,
    /// Position size (always > 0; flat positions are reported as `None`)
    pub size: Decimal,
    /// Currently attached stop-loss, if any
    pub stop_loss: Option<Decimal>,
    /// Currently attached take-profit, if any
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    /// Exchange position index
    pub position_idx: u8,
}

/// Outcome of an order-type call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange return code (0 = success)
    pub code: i64,
    /// Exchange return message
    pub message: String,
    /// Order identifier, when one was created
    pub order_id: Option<String>,
}

impl OrderResult {
    /// Successful result
    pub fn ok(order_id: Option<String>) -> Self {
        Self {
            code: RET_OK,
            message: "OK".to_string(),
            order_id,
        }
    }

    /// Failed result with the given code
    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            order_id: None,
        }
    }

    /// Whether the exchange accepted the call
    pub fn is_ok(&self) -> bool {
        self.code == RET_OK
    }
}

/// Exchange client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),
    /// Call did not finish in time
    #[error("Request timed out")]
    Timeout,
    /// Instrument not listed
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    /// Exchange throttled the request
    #[error("Rate limited")]
    RateLimited,
    /// Exchange answered with a non-zero return code
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    /// Response could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
    /// Private endpoint called without API keys
    #[error("Missing API credentials")]
    MissingCredentials,
}

impl ExchangeError {
    /// Errors worth retrying on a later tick or attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Transport(_) | ExchangeError::Timeout | ExchangeError::RateLimited
        )
    }
}
