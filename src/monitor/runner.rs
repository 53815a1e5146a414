//! Per-position monitor loop

use super::{MonitorError, RetryPolicy, TerminationReason};
use crate::config::{MonitorConfig, StopConfig};
use crate::exchange::Exchange;
use crate::execution::{GatewayFailure, StopGateway};
use crate::feed::{PositionReader, PriceFeed};
use crate::market::InstrumentSpec;
use crate::notify::Notifier;
use crate::risk::Position;
use crate::stop::{StopPhase, TrailingStop};
use crate::telemetry::metrics::{self, StopUpdateOutcome};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Drives one position's trailing stop until it closes
pub struct PositionMonitor {
    exchange: Arc<dyn Exchange>,
    spec: InstrumentSpec,
    stop_config: StopConfig,
    poll_interval: Duration,
    session_deadline: Option<Duration>,
    call_timeout: Duration,
    retry: RetryPolicy,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
}

/// Per-run collaborators
struct Session {
    position: Position,
    engine: TrailingStop,
    prices: PriceFeed,
    positions: PositionReader,
    gateway: StopGateway,
}

impl PositionMonitor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        spec: InstrumentSpec,
        stop_config: StopConfig,
        config: &MonitorConfig,
        notifier: Arc<dyn Notifier>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            exchange,
            spec,
            stop_config,
            poll_interval: config.poll_interval(),
            session_deadline: config.session_deadline(),
            call_timeout: config.call_timeout(),
            retry: config.retry_policy(),
            notifier,
            cancel,
        }
    }

    /// Monitor `position` until it closes, the deadline passes or the run is cancelled
    #[tracing::instrument(skip_all, fields(symbol = %position.symbol, side = %position.side))]
    pub async fn run(&self, position: Position) -> Result<TerminationReason, MonitorError> {
        if self.poll_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "poll interval must be non-zero".to_string(),
            ));
        }
        let engine = TrailingStop::new(position.side, position.entry_price, &self.stop_config)?;

        tracing::info!(
            entry = %position.entry_price,
            qty = %position.quantity,
            stop = %engine.state().current_stop,
            activation = %engine.activation_price(),
            "Monitoring position"
        );
        let mut opening = format!(
            "{} {}: entry {}, stop {}, trailing arms at {}",
            position.symbol,
            position.side,
            position.entry_price,
            self.spec.round_price(engine.state().current_stop),
            engine.activation_price()
        );
        if let Some(tp) = engine.take_profit() {
            opening.push_str(&format!(", take-profit {}", self.spec.round_price(tp)));
        }
        self.notifier.notify(&opening).await;

        let mut session = Session {
            prices: PriceFeed::new(self.exchange.clone(), self.call_timeout),
            positions: PositionReader::new(self.exchange.clone(), self.call_timeout),
            gateway: StopGateway::new(self.exchange.clone(), self.spec.clone(), self.call_timeout),
            position,
            engine,
        };

        let reason = self.poll(&mut session).await;

        tracing::info!(%reason, stop = ?session.engine.state().last_applied_stop, "Monitor finished");
        self.notifier
            .notify(&format!("{}: monitoring ended ({})", session.position.symbol, reason))
            .await;
        Ok(reason)
    }

    async fn poll(&self, session: &mut Session) -> TerminationReason {
        let deadline = self.session_deadline.map(|d| Instant::now() + d);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TerminationReason::Cancelled,
                _ = until(deadline) => return TerminationReason::Deadline,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TerminationReason::Cancelled,
                _ = until(deadline) => return TerminationReason::Deadline,
                outcome = self.tick(session) => outcome,
            };

            if let Some(reason) = outcome {
                return reason;
            }
        }
    }

    /// One poll cycle; `Some` ends the run
    async fn tick(&self, session: &mut Session) -> Option<TerminationReason> {
        let symbol = session.position.symbol.as_str();

        match session.positions.read(symbol).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!("Position closed");
                return Some(TerminationReason::PositionClosed);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Position read failed, skipping tick");
                metrics::record_feed_error(symbol, "position");
                return None;
            }
        }

        let price = match session.prices.latest(symbol).await {
            Ok(tick) => tick.price,
            Err(e) => {
                tracing::warn!(error = %e, "Price read failed, skipping tick");
                metrics::record_feed_error(symbol, "price");
                return None;
            }
        };

        let phase_before = session.engine.state().phase;
        let stop = match session.engine.evaluate(price) {
            Ok(Some(stop)) => stop,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Price rejected by stop engine");
                return None;
            }
        };

        if phase_before == StopPhase::Initial && session.engine.state().phase != StopPhase::Initial
        {
            tracing::info!(%price, %stop, "Trailing stop armed");
        }

        self.apply_with_retry(session, stop, price).await
    }

    async fn apply_with_retry(
        &self,
        session: &mut Session,
        stop: Decimal,
        price: Decimal,
    ) -> Option<TerminationReason> {
        let symbol = session.position.symbol.clone();
        let take_profit = session.engine.take_profit();

        for attempt in 1..=self.retry.max_attempts {
            match session
                .gateway
                .apply_stop(&session.position, stop, take_profit)
                .await
            {
                Ok(confirmed) => {
                    session.engine.mark_applied(stop);
                    metrics::set_current_stop(&symbol, confirmed.stop_price);

                    if confirmed.skipped {
                        metrics::record_stop_update(&symbol, StopUpdateOutcome::Skipped);
                        tracing::debug!(stop = %confirmed.stop_price, "Stop already held by exchange");
                    } else {
                        metrics::record_stop_update(&symbol, StopUpdateOutcome::Applied);
                        let phase = session.engine.state().phase;
                        tracing::info!(stop = %confirmed.stop_price, %price, %phase, attempt, "Stop updated");
                        self.notifier
                            .notify(&format!(
                                "{}: stop moved to {} at price {} ({})",
                                symbol, confirmed.stop_price, price, phase
                            ))
                            .await;
                    }
                    return None;
                }
                Err(GatewayFailure::PositionGone) => {
                    tracing::info!("Position gone during stop update");
                    return Some(TerminationReason::PositionClosed);
                }
                Err(e) if e.is_retryable() => {
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay(attempt);
                        tracing::warn!(error = %e, attempt, ?delay, "Stop update failed, backing off");
                        tokio::time::sleep(delay).await;
                    } else {
                        metrics::record_stop_update(&symbol, StopUpdateOutcome::Exhausted);
                        tracing::error!(error = %e, attempt, %stop, "Stop update retries exhausted");
                        self.notifier
                            .notify(&format!(
                                "{}: failed to set stop {} after {} attempts: {}",
                                symbol, stop, attempt, e
                            ))
                            .await;
                    }
                }
                Err(e) => {
                    metrics::record_stop_update(&symbol, StopUpdateOutcome::Rejected);
                    tracing::warn!(%stop, error = %e, "Stop rejected, will retry next tick");
                    return None;
                }
            }
        }

        None
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{
        ExchangeError, OrderResult, PositionSnapshot, ScriptedExchange, RET_RATE_LIMITED,
    };
    use crate::notify::CollectingNotifier;
    use crate::risk::Side;
    use rust_decimal_macros::dec;

    fn snapshot(side: Side) -> PositionSnapshot {
        PositionSnapshot {
            symbol: "BTCUSDT".to_string(),
            side,
            entry_price: dec!(100),
            size: dec!(1),
            stop_loss: None,
            take_profit: None,
            position_idx: 0,
        }
    }

    fn monitor_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 1000,
            session_deadline_secs: None,
            max_update_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 400,
            ..MonitorConfig::default()
        }
    }

    fn stop_config() -> StopConfig {
        StopConfig {
            activation_pct: dec!(1),
            initial_stop_pct: dec!(2),
            trailing_pct: dec!(1),
            lock_in_pct: dec!(0),
            take_profit_pct: None,
        }
    }

    fn monitor(
        exchange: Arc<ScriptedExchange>,
        config: MonitorConfig,
        notifier: Arc<CollectingNotifier>,
        cancel: CancellationToken,
    ) -> PositionMonitor {
        let spec = InstrumentSpec::new("BTCUSDT", dec!(0.001), dec!(0.001), dec!(0.1)).unwrap();
        PositionMonitor::new(exchange, spec, stop_config(), &config, notifier, cancel)
    }

    fn stops(calls: &[crate::exchange::StopCall]) -> Vec<Decimal> {
        calls.iter().map(|c| c.stop_price).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_walkthrough_then_close() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange
            .push_prices([dec!(100), dec!(101), dec!(110), dec!(105)])
            .await;
        // each tick reads once, each applied stop re-reads once: 3 stops + 4 ticks
        exchange.close_position_after(7).await;
        let notifier = Arc::new(CollectingNotifier::new());

        let position = Position::from_snapshot(&snapshot(Side::Long));
        let reason = monitor(
            exchange.clone(),
            monitor_config(),
            notifier.clone(),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::PositionClosed);
        assert_eq!(
            stops(&exchange.stop_calls().await),
            vec![dec!(98), dec!(100), dec!(108.9)]
        );

        let messages = notifier.messages().await;
        assert!(messages.iter().any(|m| m.contains("108.9")));
        assert!(messages.last().unwrap().contains("position closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_position_stops_gateway_calls() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100), dec!(101), dec!(110)]).await;
        exchange.close_position_after(4).await;

        let position = Position::from_snapshot(&snapshot(Side::Long));
        let reason = monitor(
            exchange.clone(),
            monitor_config(),
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::PositionClosed);
        // 110 was never read: the position vanished first
        assert_eq!(stops(&exchange.stop_calls().await), vec![dec!(98), dec!(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Short)));
        exchange.push_prices([dec!(100)]).await;
        let config = MonitorConfig {
            session_deadline_secs: Some(10),
            ..monitor_config()
        };

        let started = Instant::now();
        let position = Position::from_snapshot(&snapshot(Side::Short));
        let reason = monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::Deadline);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        // initial stop once, then idempotent
        assert_eq!(stops(&exchange.stop_calls().await), vec![dec!(102)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100)]).await;
        let cancel = CancellationToken::new();

        let position = Position::from_snapshot(&snapshot(Side::Long));
        let handle = crate::monitor::spawn_monitor(
            monitor(
                exchange.clone(),
                monitor_config(),
                Arc::new(CollectingNotifier::new()),
                cancel.clone(),
            ),
            position,
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        cancel.cancel();

        let reason = handle.await.unwrap().unwrap();
        assert_eq!(reason, TerminationReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retried_within_tick() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100)]).await;
        exchange
            .push_stop_response(Ok(OrderResult::rejected(RET_RATE_LIMITED, "too many visits")))
            .await;
        exchange
            .push_stop_response(Err(ExchangeError::Transport("reset".into())))
            .await;
        let config = MonitorConfig {
            session_deadline_secs: Some(2),
            ..monitor_config()
        };

        let position = Position::from_snapshot(&snapshot(Side::Long));
        let reason = monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::Deadline);
        assert_eq!(
            stops(&exchange.stop_calls().await),
            vec![dec!(98), dec!(98), dec!(98)]
        );
        assert_eq!(exchange.position().await.unwrap().stop_loss, Some(dec!(98)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_notify_and_retry_next_tick() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100)]).await;
        for _ in 0..3 {
            exchange.push_stop_response(Err(ExchangeError::Timeout)).await;
        }
        let notifier = Arc::new(CollectingNotifier::new());
        let config = MonitorConfig {
            session_deadline_secs: Some(2),
            ..monitor_config()
        };

        let position = Position::from_snapshot(&snapshot(Side::Long));
        monitor(exchange.clone(), config, notifier.clone(), CancellationToken::new())
            .run(position)
            .await
            .unwrap();

        assert_eq!(exchange.stop_calls().await.len(), 4);
        assert!(notifier
            .messages()
            .await
            .iter()
            .any(|m| m.contains("after 3 attempts")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_backoff() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100)]).await;
        for _ in 0..3 {
            exchange.push_stop_response(Err(ExchangeError::Timeout)).await;
        }
        let config = MonitorConfig {
            session_deadline_secs: Some(1),
            initial_backoff_ms: 60_000,
            max_backoff_ms: 120_000,
            ..monitor_config()
        };

        let started = Instant::now();
        let position = Position::from_snapshot(&snapshot(Side::Long));
        let reason = monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::Deadline);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(exchange.stop_calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_profit_sent_once() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Short)));
        exchange.push_prices([dec!(100)]).await;
        let notifier = Arc::new(CollectingNotifier::new());
        let config = MonitorConfig {
            session_deadline_secs: Some(3),
            ..monitor_config()
        };
        let spec = InstrumentSpec::new("BTCUSDT", dec!(0.001), dec!(0.001), dec!(0.1)).unwrap();
        let stop = StopConfig {
            take_profit_pct: Some(dec!(5)),
            ..stop_config()
        };

        let reason = PositionMonitor::new(
            exchange.clone(),
            spec,
            stop,
            &config,
            notifier.clone(),
            CancellationToken::new(),
        )
        .run(Position::from_snapshot(&snapshot(Side::Short)))
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::Deadline);
        let calls = exchange.stop_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].stop_price, dec!(102));
        assert_eq!(calls[0].take_profit, Some(dec!(95)));
        assert_eq!(exchange.position().await.unwrap().take_profit, Some(dec!(95)));
        assert!(notifier.messages().await[0].contains("take-profit 95"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_setup_error() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        let config = MonitorConfig {
            poll_interval_ms: 0,
            ..monitor_config()
        };

        let result = monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(Position::from_snapshot(&snapshot(Side::Long)))
        .await;

        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
        assert_eq!(exchange.position_reads().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_stop_retried_next_tick() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_prices([dec!(100)]).await;
        exchange
            .push_stop_response(Ok(OrderResult::rejected(10001, "StopLoss invalid")))
            .await;
        let config = MonitorConfig {
            session_deadline_secs: Some(3),
            ..monitor_config()
        };

        let position = Position::from_snapshot(&snapshot(Side::Long));
        monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        // rejected on the first tick, applied on the second, idle on the third
        assert_eq!(stops(&exchange.stop_calls().await), vec![dec!(98), dec!(98)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_errors_skip_tick() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        exchange.push_price_error(ExchangeError::Timeout).await;
        exchange.push_position_error(ExchangeError::RateLimited).await;
        exchange.push_prices([dec!(101)]).await;
        let config = MonitorConfig {
            session_deadline_secs: Some(3),
            ..monitor_config()
        };

        let position = Position::from_snapshot(&snapshot(Side::Long));
        let reason = monitor(
            exchange.clone(),
            config,
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        )
        .run(position)
        .await
        .unwrap();

        assert_eq!(reason, TerminationReason::Deadline);
        // tick 1: position read fails; tick 2: price read fails; tick 3: armed at 101
        assert_eq!(stops(&exchange.stop_calls().await), vec![dec!(100)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_stop_config_is_setup_error() {
        let exchange = Arc::new(ScriptedExchange::new().with_position(snapshot(Side::Long)));
        let spec = InstrumentSpec::new("BTCUSDT", dec!(0.001), dec!(0.001), dec!(0.1)).unwrap();
        let bad = StopConfig {
            trailing_pct: dec!(0),
            ..stop_config()
        };
        let monitor = PositionMonitor::new(
            exchange.clone(),
            spec,
            bad,
            &monitor_config(),
            Arc::new(CollectingNotifier::new()),
            CancellationToken::new(),
        );

        let result = monitor
            .run(Position::from_snapshot(&snapshot(Side::Long)))
            .await;
        assert!(matches!(result, Err(MonitorError::Stop(_))));
        assert_eq!(exchange.position_reads().await, 0);
    }
}
