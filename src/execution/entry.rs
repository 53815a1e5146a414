//! Market entry
//!
//! Opens a position with a market IOC order sized from a dollar notional
//! and waits for the exchange to list it.

use super::EntryError;
use crate::config::MonitorConfig;
use crate::exchange::Exchange;
use crate::feed::{PositionReader, PriceFeed};
use crate::market::InstrumentSpec;
use crate::notify::Notifier;
use crate::risk::{NotionalSizer, Position, Side};
use std::sync::Arc;
use std::time::Duration;

/// Places entry orders
pub struct EntryExecutor {
    exchange: Arc<dyn Exchange>,
    prices: PriceFeed,
    positions: PositionReader,
    notifier: Arc<dyn Notifier>,
    read_attempts: u32,
    read_delay: Duration,
}

impl EntryExecutor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        config: &MonitorConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            prices: PriceFeed::new(exchange.clone(), config.call_timeout()),
            positions: PositionReader::new(exchange.clone(), config.call_timeout()),
            exchange,
            notifier,
            read_attempts: config.position_read_attempts,
            read_delay: config.position_read_delay(),
        }
    }

    /// Open a `side` position sized by `sizer`
    pub async fn open(
        &self,
        spec: &InstrumentSpec,
        side: Side,
        sizer: &NotionalSizer,
    ) -> Result<Position, EntryError> {
        let symbol = spec.symbol.as_str();

        if self.positions.read(symbol).await?.is_some() {
            return Err(EntryError::AlreadyOpen(symbol.to_string()));
        }

        let tick = self.prices.latest(symbol).await?;
        let qty = sizer.quantity(tick.price, spec)?;

        tracing::info!(
            symbol,
            %side,
            %qty,
            price = %tick.price,
            notional = %sizer.notional,
            "Placing entry order"
        );

        let result = self.exchange.place_market_order(symbol, side, qty).await?;
        if !result.is_ok() {
            return Err(EntryError::Rejected {
                code: result.code,
                message: result.message,
            });
        }

        let settled = self
            .positions
            .read_settled(symbol, self.read_attempts, self.read_delay)
            .await;
        let snapshot = match settled {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.unprotected(symbol, side, result.order_id.as_deref()).await;
                return Err(EntryError::NotFilled(symbol.to_string()));
            }
            Err(e) => {
                self.unprotected(symbol, side, result.order_id.as_deref()).await;
                return Err(e.into());
            }
        };

        let position = Position::from_snapshot(&snapshot);
        tracing::info!(
            symbol,
            side = %position.side,
            entry = %position.entry_price,
            qty = %position.quantity,
            order_id = ?result.order_id,
            "Position opened"
        );
        Ok(position)
    }

    /// The order went through but the position could not be confirmed
    async fn unprotected(&self, symbol: &str, side: Side, order_id: Option<&str>) {
        tracing::error!(symbol, %side, ?order_id, "Entry order accepted but position not confirmed");
        self.notifier
            .notify(&format!(
                "{}: {} entry order {} accepted but no position confirmed, check it has a stop",
                symbol,
                side,
                order_id.unwrap_or("-")
            ))
            .await;
    }
}
