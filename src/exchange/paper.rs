//! Paper trading exchange
//!
//! Market data comes from a real exchange; fills, positions and stop
//! triggers are simulated locally.

use super::types::{ExchangeError, InstrumentLimits, OrderResult, PositionSnapshot};
use super::Exchange;
use crate::risk::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Return code used when a stop is set with no open position
const RET_NO_POSITION: i64 = 10001;

/// Paper exchange with simulated fills on top of live prices
pub struct PaperExchange {
    market: Arc<dyn Exchange>,
    positions: Arc<RwLock<HashMap<String, PositionSnapshot>>>,
}

impl PaperExchange {
    /// Create a paper exchange reading prices from `market`
    pub fn new(market: Arc<dyn Exchange>) -> Self {
        Self {
            market,
            positions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Close the simulated position when the price crosses its stop or take-profit
    async fn check_stop(&self, symbol: &str, price: Decimal) {
        let mut positions = self.positions.write().await;
        let triggered = positions.get(symbol).and_then(|p| {
            let stopped = p.stop_loss.is_some_and(|stop| match p.side {
                Side::Long => price <= stop,
                Side::Short => price >= stop,
            });
            let took_profit = p.take_profit.is_some_and(|tp| match p.side {
                Side::Long => price >= tp,
                Side::Short => price <= tp,
            });
            if stopped {
                Some("stop-loss")
            } else if took_profit {
                Some("take-profit")
            } else {
                None
            }
        });

        if let Some(trigger) = triggered {
            if let Some(closed) = positions.remove(symbol) {
                tracing::info!(
                    symbol,
                    side = %closed.side,
                    %price,
                    trigger,
                    stop = ?closed.stop_loss,
                    take_profit = ?closed.take_profit,
                    "Paper protective order triggered, position closed"
                );
            }
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let price = self.market.last_price(symbol).await?;
        self.check_stop(symbol, price).await;
        Ok(price)
    }

    async fn instrument_limits(&self, symbol: &str) -> Result<InstrumentLimits, ExchangeError> {
        self.market.instrument_limits(symbol).await
    }

    async fn open_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, ExchangeError> {
        let positions = self.positions.read().await;
        Ok(positions.get(symbol).cloned())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let price = self.market.last_price(symbol).await?;
        let mut positions = self.positions.write().await;

        let next = match positions.remove(symbol) {
            None => Some(PositionSnapshot {
                symbol: symbol.to_string(),
                side,
                entry_price: price,
                size: qty,
                stop_loss: None,
                take_profit: None,
                position_idx: 0,
            }),
            Some(mut existing) if existing.side == side => {
                let total = existing.size + qty;
                existing.entry_price = (existing.entry_price * existing.size + price * qty) / total;
                existing.size = total;
                Some(existing)
            }
            Some(mut existing) => {
                if qty < existing.size {
                    existing.size -= qty;
                    Some(existing)
                } else if qty > existing.size {
                    Some(PositionSnapshot {
                        symbol: symbol.to_string(),
                        side,
                        entry_price: price,
                        size: qty - existing.size,
                        stop_loss: None,
                        take_profit: None,
                        position_idx: 0,
                    })
                } else {
                    None
                }
            }
        };

        if let Some(position) = next {
            positions.insert(symbol.to_string(), position);
        }

        let order_id = Uuid::new_v4().to_string();
        tracing::info!(symbol, %side, %qty, %price, order_id = %order_id, "Paper order filled");
        Ok(OrderResult::ok(Some(order_id)))
    }

    async fn set_protective_stop(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        take_profit: Option<Decimal>,
        _position_idx: u8,
    ) -> Result<OrderResult, ExchangeError> {
        let mut positions = self.positions.write().await;
        match positions.get_mut(symbol) {
            Some(position) if position.side == side => {
                position.stop_loss = Some(stop_price);
                if take_profit.is_some() {
                    position.take_profit = take_profit;
                }
                tracing::info!(symbol, %stop_price, ?take_profit, "Paper stop set");
                Ok(OrderResult::ok(None))
            }
            _ => Ok(OrderResult::rejected(RET_NO_POSITION, "position not exists")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ScriptedExchange;
    use rust_decimal_macros::dec;

    async fn paper_with_prices(prices: &[Decimal]) -> PaperExchange {
        let market = ScriptedExchange::new();
        market.push_prices(prices.iter().copied()).await;
        PaperExchange::new(Arc::new(market))
    }

    #[tokio::test]
    async fn test_paper_order_opens_position() {
        let paper = paper_with_prices(&[dec!(100)]).await;

        let result = paper
            .place_market_order("BTCUSDT", Side::Long, dec!(2))
            .await
            .unwrap();
        assert!(result.is_ok());
        assert!(result.order_id.is_some());

        let position = paper.open_position("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.entry_price, dec!(100));
        assert_eq!(position.size, dec!(2));
    }

    #[tokio::test]
    async fn test_paper_order_averages_entry() {
        let paper = paper_with_prices(&[dec!(100), dec!(110)]).await;

        paper
            .place_market_order("BTCUSDT", Side::Long, dec!(1))
            .await
            .unwrap();
        paper
            .place_market_order("BTCUSDT", Side::Long, dec!(1))
            .await
            .unwrap();

        let position = paper.open_position("BTCUSDT").await.unwrap().unwrap();
        assert_eq!(position.size, dec!(2));
        assert_eq!(position.entry_price, dec!(105));
    }

    #[tokio::test]
    async fn test_paper_opposite_order_flattens() {
        let paper = paper_with_prices(&[dec!(100)]).await;

        paper
            .place_market_order("BTCUSDT", Side::Long, dec!(1))
            .await
            .unwrap();
        paper
            .place_market_order("BTCUSDT", Side::Short, dec!(1))
            .await
            .unwrap();

        assert!(paper.open_position("BTCUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paper_stop_triggers_long() {
        let paper = paper_with_prices(&[dec!(100), dec!(99), dec!(97.5)]).await;

        paper
            .place_market_order("BTCUSDT", Side::Long, dec!(1))
            .await
            .unwrap();
        let result = paper
            .set_protective_stop("BTCUSDT", Side::Long, dec!(98), None, 0)
            .await
            .unwrap();
        assert!(result.is_ok());

        paper.last_price("BTCUSDT").await.unwrap(); // 99, above stop
        assert!(paper.open_position("BTCUSDT").await.unwrap().is_some());

        paper.last_price("BTCUSDT").await.unwrap(); // 97.5, through stop
        assert!(paper.open_position("BTCUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paper_stop_triggers_short() {
        let paper = paper_with_prices(&[dec!(100), dec!(102)]).await;

        paper
            .place_market_order("BTCUSDT", Side::Short, dec!(1))
            .await
            .unwrap();
        paper
            .set_protective_stop("BTCUSDT", Side::Short, dec!(102), None, 0)
            .await
            .unwrap();

        paper.last_price("BTCUSDT").await.unwrap();
        assert!(paper.open_position("BTCUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paper_take_profit_triggers_long() {
        let paper = paper_with_prices(&[dec!(100), dec!(104), dec!(105.2)]).await;

        paper
            .place_market_order("BTCUSDT", Side::Long, dec!(1))
            .await
            .unwrap();
        paper
            .set_protective_stop("BTCUSDT", Side::Long, dec!(98), Some(dec!(105)), 0)
            .await
            .unwrap();

        paper.last_price("BTCUSDT").await.unwrap(); // 104, below target
        assert!(paper.open_position("BTCUSDT").await.unwrap().is_some());

        paper.last_price("BTCUSDT").await.unwrap(); // 105.2, through target
        assert!(paper.open_position("BTCUSDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paper_stop_without_position_rejected() {
        let paper = paper_with_prices(&[dec!(100)]).await;
        let result = paper
            .set_protective_stop("BTCUSDT", Side::Long, dec!(98), None, 0)
            .await
            .unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.code, RET_NO_POSITION);
    }
}
