//! Last-price polling

use super::{FeedError, PriceTick};
use crate::exchange::Exchange;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Polls the last traded price for a symbol
pub struct PriceFeed {
    exchange: Arc<dyn Exchange>,
    timeout: Duration,
}

impl PriceFeed {
    /// Create a feed whose reads give up after `timeout`
    pub fn new(exchange: Arc<dyn Exchange>, timeout: Duration) -> Self {
        Self { exchange, timeout }
    }

    /// Read the current price
    pub async fn latest(&self, symbol: &str) -> Result<PriceTick, FeedError> {
        let started = Instant::now();
        let price = tokio::time::timeout(self.timeout, self.exchange.last_price(symbol))
            .await
            .map_err(|_| FeedError::Timeout)??;

        crate::telemetry::metrics::record_feed_latency("price", started.elapsed());

        if price <= Decimal::ZERO {
            return Err(FeedError::InvalidPrice(price));
        }

        Ok(PriceTick {
            symbol: symbol.to_string(),
            price,
            timestamp: Utc::now(),
        })
    }
}
