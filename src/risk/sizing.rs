//! Quantity sizing
//!
//! Turns a notional dollar amount into an exchange-legal order quantity:
//! at least the instrument minimum and an exact multiple of its step.

use rust_decimal::{Decimal, RoundingStrategy};

use super::SizingError;
use crate::config::SizingConfig;
use crate::market::InstrumentSpec;

/// Size an order for `notional` dollars at `price`
///
/// The raw quantity is clamped to the instrument minimum and then rounded
/// down to the step grid. A minimum that is not itself on the grid is
/// raised to the next step multiple.
pub fn size_quantity(
    notional: Decimal,
    price: Decimal,
    spec: &InstrumentSpec,
) -> Result<Decimal, SizingError> {
    if spec.quantity_step <= Decimal::ZERO {
        return Err(SizingError::InvalidSpec(spec.symbol.clone()));
    }
    if notional <= Decimal::ZERO {
        return Err(SizingError::InvalidInput(format!("notional {notional}")));
    }
    if price <= Decimal::ZERO {
        return Err(SizingError::InvalidInput(format!("price {price}")));
    }

    let step = spec.quantity_step;
    let raw = (notional / price).max(spec.min_quantity);

    let mut qty = ((raw / step).floor() * step)
        .round_dp_with_strategy(spec.decimal_precision, RoundingStrategy::ToZero);

    if qty < spec.min_quantity {
        qty = ((spec.min_quantity / step).ceil() * step)
            .round_dp_with_strategy(spec.decimal_precision, RoundingStrategy::ToZero);
    }

    Ok(qty.normalize())
}

/// Fixed-notional sizer
#[derive(Debug, Clone)]
pub struct NotionalSizer {
    /// Dollar amount per entry
    pub notional: Decimal,
}

impl NotionalSizer {
    /// Create a new sizer
    pub fn new(notional: Decimal) -> Self {
        Self { notional }
    }

    /// Create from SizingConfig
    pub fn from_config(config: &SizingConfig) -> Self {
        Self::new(config.notional_usd)
    }

    /// Quantity for one entry at `price`
    pub fn quantity(&self, price: Decimal, spec: &InstrumentSpec) -> Result<Decimal, SizingError> {
        size_quantity(self.notional, price, spec)
    }
}
