//! Exchange access module
//!
//! The polled capabilities the guard consumes, a Bybit v5 REST client,
//! a paper-trading exchange and the shared API-call budget. A scripted
//! replay exchange is available to tests behind the `test-util` feature.

mod budget;
mod bybit;
mod paper;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod types;

pub use budget::ApiBudget;
pub use bybit::{BybitClient, BybitConfig, Credentials, BYBIT_API_URL};
pub use paper::PaperExchange;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{ScriptedExchange, StopCall};
pub use types::{
    ExchangeError, InstrumentLimits, OrderResult, PositionSnapshot, RET_NOT_MODIFIED, RET_OK,
    RET_RATE_LIMITED,
};

use crate::risk::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Trait for exchange implementations
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Last traded price for a symbol
    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Lot and price filters for a symbol
    async fn instrument_limits(&self, symbol: &str) -> Result<InstrumentLimits, ExchangeError>;

    /// Currently open position, `None` when flat
    async fn open_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, ExchangeError>;

    /// Place a market order that opens or adds to a position
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderResult, ExchangeError>;

    /// Set (or replace) the position's stop-loss, and its take-profit when given
    async fn set_protective_stop(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        take_profit: Option<Decimal>,
        position_idx: u8,
    ) -> Result<OrderResult, ExchangeError>;
}
