//! Instrument specification module
//!
//! Resolves lot-size and tick filters per symbol and caches them for the
//! lifetime of the process.

mod resolver;

pub use resolver::{InstrumentResolver, ResolveError};

use crate::exchange::InstrumentLimits;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Trading filters for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Trading symbol
    pub symbol: String,
    /// Minimum order quantity
    pub min_quantity: Decimal,
    /// Order quantity increment
    pub quantity_step: Decimal,
    /// Price increment
    pub tick_size: Decimal,
    /// Fractional digits of `quantity_step`
    pub decimal_precision: u32,
}

impl InstrumentSpec {
    /// Build a spec; `None` when the step or tick is not positive or min is negative
    pub fn new(
        symbol: impl Into<String>,
        min_quantity: Decimal,
        quantity_step: Decimal,
        tick_size: Decimal,
    ) -> Option<Self> {
        if quantity_step <= Decimal::ZERO
            || tick_size <= Decimal::ZERO
            || min_quantity < Decimal::ZERO
        {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            min_quantity,
            quantity_step,
            tick_size,
            decimal_precision: quantity_step.normalize().scale(),
        })
    }

    /// Build a spec from exchange filters
    pub fn from_limits(symbol: impl Into<String>, limits: &InstrumentLimits) -> Option<Self> {
        Self::new(symbol, limits.min_qty, limits.qty_step, limits.tick_size)
    }

    /// Round a price to the nearest tick
    pub fn round_price(&self, price: Decimal) -> Decimal {
        if self.tick_size <= Decimal::ZERO {
            return price;
        }
        let ticks = (price / self.tick_size)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        (ticks * self.tick_size).normalize()
    }
}
