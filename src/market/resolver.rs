//! Instrument resolver with a per-symbol cache

use super::InstrumentSpec;
use crate::exchange::{Exchange, ExchangeError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Instrument resolution errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Exchange has no listing for the symbol
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    /// Instrument data could not be fetched
    #[error("Instrument feed unavailable: {0}")]
    FeedUnavailable(String),
    /// Listing carries unusable filters
    #[error("Invalid instrument spec for {0}")]
    InvalidSpec(String),
}

/// Resolves symbols to [`InstrumentSpec`]s, caching successful lookups
pub struct InstrumentResolver {
    exchange: Arc<dyn Exchange>,
    cache: Arc<RwLock<HashMap<String, InstrumentSpec>>>,
}

impl InstrumentResolver {
    /// Create a resolver backed by `exchange`
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self {
            exchange,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve a symbol, hitting the exchange only on a cache miss
    pub async fn resolve(&self, symbol: &str) -> Result<InstrumentSpec, ResolveError> {
        if let Some(spec) = self.cache.read().await.get(symbol) {
            return Ok(spec.clone());
        }

        let limits = self
            .exchange
            .instrument_limits(symbol)
            .await
            .map_err(|e| match e {
                ExchangeError::SymbolNotFound(s) => ResolveError::SymbolNotFound(s),
                other => ResolveError::FeedUnavailable(other.to_string()),
            })?;

        let spec = InstrumentSpec::from_limits(symbol, &limits)
            .ok_or_else(|| ResolveError::InvalidSpec(symbol.to_string()))?;

        tracing::debug!(
            symbol,
            min_qty = %spec.min_quantity,
            qty_step = %spec.quantity_step,
            tick = %spec.tick_size,
            "Resolved instrument"
        );

        let mut cache = self.cache.write().await;
        cache.insert(symbol.to_string(), spec.clone());
        Ok(spec)
    }

    /// Number of cached symbols
    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}
