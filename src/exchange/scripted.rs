//! Scripted replay exchange
//!
//! Serves prices from a queue and keeps a single in-memory position per
//! symbol so the monitor can be driven tick by tick without a network.

use super::types::{ExchangeError, InstrumentLimits, OrderResult, PositionSnapshot};
use super::Exchange;
use crate::risk::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A recorded protective-stop call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopCall {
    pub symbol: String,
    pub side: Side,
    pub stop_price: Decimal,
    pub take_profit: Option<Decimal>,
}

#[derive(Debug, Default)]
struct ScriptState {
    prices: VecDeque<Result<Decimal, ExchangeError>>,
    last_price: Option<Decimal>,
    instruments: HashMap<String, InstrumentLimits>,
    position: Option<PositionSnapshot>,
    position_errors: VecDeque<ExchangeError>,
    close_after_reads: Option<usize>,
    hidden_reads: usize,
    position_reads: usize,
    stop_responses: VecDeque<Result<OrderResult, ExchangeError>>,
    stop_calls: Vec<StopCall>,
    order_calls: Vec<(String, Side, Decimal)>,
    order_responses: VecDeque<OrderResult>,
}

/// Exchange double with scripted market data and recorded calls
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    state: Mutex<ScriptState>,
}

impl ScriptedExchange {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Register instrument filters for a symbol
    pub fn with_instrument(mut self, symbol: &str, limits: InstrumentLimits) -> Self {
        self.state
            .get_mut()
            .instruments
            .insert(symbol.to_string(), limits);
        self
    }

    /// Start with an open position
    pub fn with_position(mut self, snapshot: PositionSnapshot) -> Self {
        self.state.get_mut().position = Some(snapshot);
        self
    }

    /// Queue prices; the last one repeats once the queue drains
    pub async fn push_prices(&self, prices: impl IntoIterator<Item = Decimal>) {
        let mut state = self.state.lock().await;
        state.prices.extend(prices.into_iter().map(Ok));
    }

    /// Queue a failed price read
    pub async fn push_price_error(&self, error: ExchangeError) {
        self.state.lock().await.prices.push_back(Err(error));
    }

    /// Queue a failed position read
    pub async fn push_position_error(&self, error: ExchangeError) {
        self.state.lock().await.position_errors.push_back(error);
    }

    /// Queue the outcome of the next protective-stop call
    pub async fn push_stop_response(&self, response: Result<OrderResult, ExchangeError>) {
        self.state.lock().await.stop_responses.push_back(response);
    }

    /// Queue the outcome of the next market order
    pub async fn push_order_response(&self, response: OrderResult) {
        self.state.lock().await.order_responses.push_back(response);
    }

    /// Flatten the position after `reads` more position reads
    pub async fn close_position_after(&self, reads: usize) {
        self.state.lock().await.close_after_reads = Some(reads);
    }

    /// Hide a freshly opened position for `reads` reads (propagation delay)
    pub async fn hide_position_for(&self, reads: usize) {
        self.state.lock().await.hidden_reads = reads;
    }

    /// Protective-stop calls received so far
    pub async fn stop_calls(&self) -> Vec<StopCall> {
        self.state.lock().await.stop_calls.clone()
    }

    /// Market orders received so far
    pub async fn order_calls(&self) -> Vec<(String, Side, Decimal)> {
        self.state.lock().await.order_calls.clone()
    }

    /// Number of position reads served
    pub async fn position_reads(&self) -> usize {
        self.state.lock().await.position_reads
    }

    /// Current in-memory position
    pub async fn position(&self) -> Option<PositionSnapshot> {
        self.state.lock().await.position.clone()
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn last_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().await;
        match state.prices.pop_front() {
            Some(Ok(price)) => {
                state.last_price = Some(price);
                Ok(price)
            }
            Some(Err(e)) => Err(e),
            None => state
                .last_price
                .ok_or_else(|| ExchangeError::Transport("no price scripted".to_string())),
        }
    }

    async fn instrument_limits(&self, symbol: &str) -> Result<InstrumentLimits, ExchangeError> {
        let state = self.state.lock().await;
        state
            .instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    async fn open_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, ExchangeError> {
        let mut state = self.state.lock().await;
        state.position_reads += 1;

        if let Some(error) = state.position_errors.pop_front() {
            return Err(error);
        }
        if let Some(remaining) = state.close_after_reads {
            if remaining == 0 {
                state.position = None;
                state.close_after_reads = None;
            } else {
                state.close_after_reads = Some(remaining - 1);
            }
        }
        if state.hidden_reads > 0 {
            state.hidden_reads -= 1;
            return Ok(None);
        }

        Ok(state.position.clone().filter(|p| p.symbol == symbol))
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let mut state = self.state.lock().await;
        state.order_calls.push((symbol.to_string(), side, qty));

        if let Some(response) = state.order_responses.pop_front() {
            if !response.is_ok() {
                return Ok(response);
            }
        }

        let price = state
            .last_price
            .or_else(|| state.prices.iter().find_map(|p| p.as_ref().ok().copied()))
            .ok_or_else(|| ExchangeError::Transport("no price scripted".to_string()))?;

        state.position = Some(PositionSnapshot {
            symbol: symbol.to_string(),
            side,
            entry_price: price,
            size: qty,
            stop_loss: None,
            take_profit: None,
            position_idx: 0,
        });
        Ok(OrderResult::ok(Some(Uuid::new_v4().to_string())))
    }

    async fn set_protective_stop(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        take_profit: Option<Decimal>,
        _position_idx: u8,
    ) -> Result<OrderResult, ExchangeError> {
        let mut state = self.state.lock().await;
        state.stop_calls.push(StopCall {
            symbol: symbol.to_string(),
            side,
            stop_price,
            take_profit,
        });

        let response = state
            .stop_responses
            .pop_front()
            .unwrap_or_else(|| Ok(OrderResult::ok(None)))?;

        if response.is_ok() {
            if let Some(position) = state.position.as_mut() {
                position.stop_loss = Some(stop_price);
                if take_profit.is_some() {
                    position.take_profit = take_profit;
                }
            }
        }
        Ok(response)
    }
}
