//! Open-position reads

use super::FeedError;
use crate::exchange::{Exchange, PositionSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Reads the open position for a symbol
pub struct PositionReader {
    exchange: Arc<dyn Exchange>,
    timeout: Duration,
}

impl PositionReader {
    /// Create a reader whose reads give up after `timeout`
    pub fn new(exchange: Arc<dyn Exchange>, timeout: Duration) -> Self {
        Self { exchange, timeout }
    }

    /// Current open position, `None` when flat
    pub async fn read(&self, symbol: &str) -> Result<Option<PositionSnapshot>, FeedError> {
        let started = Instant::now();
        let snapshot = tokio::time::timeout(self.timeout, self.exchange.open_position(symbol))
            .await
            .map_err(|_| FeedError::Timeout)??;

        crate::telemetry::metrics::record_feed_latency("position", started.elapsed());
        Ok(snapshot.filter(|p| !p.size.is_zero()))
    }

    /// Read until a position shows up, at most `attempts` times
    ///
    /// Used right after a fill, when the exchange may not list the
    /// position yet. Failed reads count as attempts; the last failure is
    /// returned if no read succeeded at all.
    pub async fn read_settled(
        &self,
        symbol: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Option<PositionSnapshot>, FeedError> {
        let mut last_error = None;
        let mut any_ok = false;

        for attempt in 1..=attempts.max(1) {
            match self.read(symbol).await {
                Ok(Some(position)) => return Ok(Some(position)),
                Ok(None) => any_ok = true,
                Err(e) => {
                    tracing::debug!(symbol, attempt, error = %e, "Position read failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }

        match last_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(None),
        }
    }
}
