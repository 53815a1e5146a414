//! Trailing-stop state machine
//!
//! Holds a fixed initial stop until price moves `activation_pct` in the
//! position's favor, then moves the stop to breakeven (plus `lock_in_pct`)
//! and ratchets it behind every new favorable extreme at `trailing_pct`.
//! The stop never moves against the position.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{StopError, StopPhase, StopState};
use crate::config::StopConfig;
use crate::risk::Side;

/// Trailing stop for one position
#[derive(Debug, Clone)]
pub struct TrailingStop {
    side: Side,
    entry_price: Decimal,
    activation_price: Decimal,
    breakeven_stop: Decimal,
    trailing_fraction: Decimal,
    take_profit: Option<Decimal>,
    state: StopState,
}

/// `base` moved by `pct` percent, up for `sign` = 1, down for -1
fn offset(base: Decimal, pct: Decimal, sign: Decimal) -> Decimal {
    base * (Decimal::ONE + sign * pct / dec!(100))
}

impl TrailingStop {
    /// Create a stop for a position entered at `entry_price`
    pub fn new(side: Side, entry_price: Decimal, config: &StopConfig) -> Result<Self, StopError> {
        if entry_price <= Decimal::ZERO {
            return Err(StopError::InvalidEntry(entry_price));
        }
        config.validate().map_err(StopError::InvalidConfig)?;

        // +1 toward profit for this side
        let favorable = match side {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        };

        let initial_stop = offset(entry_price, config.initial_stop_pct, -favorable);
        let take_profit = config
            .take_profit_pct
            .map(|pct| offset(entry_price, pct, favorable));
        if let Some(tp) = take_profit.filter(|tp| *tp <= Decimal::ZERO) {
            return Err(StopError::InvalidConfig(format!(
                "take-profit {} is not a valid price",
                tp
            )));
        }

        Ok(Self {
            side,
            entry_price,
            activation_price: offset(entry_price, config.activation_pct, favorable),
            breakeven_stop: offset(entry_price, config.lock_in_pct, favorable),
            trailing_fraction: config.trailing_pct / dec!(100),
            take_profit,
            state: StopState {
                phase: StopPhase::Initial,
                best_price: entry_price,
                current_stop: initial_stop,
                last_applied_stop: None,
            },
        })
    }

    /// Feed one price tick
    ///
    /// Returns the stop to send to the exchange, or `None` when the
    /// exchange already holds the current stop.
    pub fn evaluate(&mut self, price: Decimal) -> Result<Option<Decimal>, StopError> {
        if price <= Decimal::ZERO {
            return Err(StopError::InvalidPrice(price));
        }

        match self.state.phase {
            StopPhase::Initial => {
                if self.activation_reached(price) {
                    self.state.phase = StopPhase::Armed;
                    self.state.best_price = price;
                    if self.side.is_more_favorable(self.breakeven_stop, self.state.current_stop) {
                        self.state.current_stop = self.breakeven_stop;
                    }
                    tracing::debug!(
                        side = %self.side,
                        %price,
                        stop = %self.state.current_stop,
                        "Trailing stop armed"
                    );
                }
            }
            StopPhase::Armed | StopPhase::Trailing => {
                if self.side.is_more_favorable(price, self.state.best_price) {
                    self.state.best_price = price;
                    let candidate = self.trail_from(price);
                    if self.side.is_more_favorable(candidate, self.state.current_stop) {
                        self.state.current_stop = candidate;
                        self.state.phase = StopPhase::Trailing;
                    }
                }
            }
        }

        if self.state.last_applied_stop == Some(self.state.current_stop) {
            Ok(None)
        } else {
            Ok(Some(self.state.current_stop))
        }
    }

    /// Record that the exchange confirmed `stop`
    pub fn mark_applied(&mut self, stop: Decimal) {
        self.state.last_applied_stop = Some(stop);
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Price at which the stop arms
    pub fn activation_price(&self) -> Decimal {
        self.activation_price
    }

    /// Fixed take-profit price, set once from the entry
    pub fn take_profit(&self) -> Option<Decimal> {
        self.take_profit
    }

    pub fn state(&self) -> &StopState {
        &self.state
    }

    pub fn side(&self) -> Side {
        self.side
    }

    fn activation_reached(&self, price: Decimal) -> bool {
        match self.side {
            Side::Long => price >= self.activation_price,
            Side::Short => price <= self.activation_price,
        }
    }

    fn trail_from(&self, best: Decimal) -> Decimal {
        match self.side {
            Side::Long => best * (Decimal::ONE - self.trailing_fraction),
            Side::Short => best * (Decimal::ONE + self.trailing_fraction),
        }
    }
}
