//! Protective-stop gateway
//!
//! Sends at most one stop write per call, skipping it when the exchange
//! already holds the requested (tick-rounded) stop and take-profit.

use super::{Confirmed, GatewayFailure};
use crate::exchange::{Exchange, OrderResult, RET_NOT_MODIFIED, RET_OK, RET_RATE_LIMITED};
use crate::market::InstrumentSpec;
use crate::risk::Position;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Applies protective stops for one instrument
pub struct StopGateway {
    exchange: Arc<dyn Exchange>,
    spec: InstrumentSpec,
    timeout: Duration,
}

impl StopGateway {
    pub fn new(exchange: Arc<dyn Exchange>, spec: InstrumentSpec, timeout: Duration) -> Self {
        Self {
            exchange,
            spec,
            timeout,
        }
    }

    /// Make the exchange hold `stop` (and `take_profit`, if any) for `position`
    pub async fn apply_stop(
        &self,
        position: &Position,
        stop: Decimal,
        take_profit: Option<Decimal>,
    ) -> Result<Confirmed, GatewayFailure> {
        let stop_price = self.spec.round_price(stop);
        let take_profit = take_profit.map(|tp| self.spec.round_price(tp));

        let read = self.exchange.open_position(&position.symbol);
        let current = tokio::time::timeout(self.timeout, read)
            .await
            .map_err(|_| GatewayFailure::Transport("position read timed out".to_string()))??;

        let current = match current {
            Some(p) if p.side == position.side && !p.size.is_zero() => p,
            _ => return Err(GatewayFailure::PositionGone),
        };

        let take_profit_held = take_profit.is_none() || current.take_profit == take_profit;
        if current.stop_loss == Some(stop_price) && take_profit_held {
            tracing::debug!(symbol = %position.symbol, stop = %stop_price, "Stop already in place");
            return Ok(Confirmed {
                stop_price,
                take_profit,
                skipped: true,
            });
        }

        let result = tokio::time::timeout(
            self.timeout,
            self.exchange.set_protective_stop(
                &position.symbol,
                position.side,
                stop_price,
                take_profit,
                position.position_idx,
            ),
        )
        .await
        .map_err(|_| GatewayFailure::Transport("stop update timed out".to_string()))??;

        classify(result).map(|()| Confirmed {
            stop_price,
            take_profit,
            skipped: false,
        })
    }
}

fn classify(result: OrderResult) -> Result<(), GatewayFailure> {
    match result.code {
        RET_OK | RET_NOT_MODIFIED => Ok(()),
        RET_RATE_LIMITED => Err(GatewayFailure::RateLimited),
        code => Err(GatewayFailure::Rejected {
            code,
            message: result.message,
        }),
    }
}
