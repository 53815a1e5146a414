//! End-to-end integration tests

use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use trail_guard::config::{Config, ExecutionMode, MonitorConfig};
use trail_guard::exchange::{Exchange, InstrumentLimits, PaperExchange, ScriptedExchange};
use trail_guard::execution::EntryExecutor;
use trail_guard::market::InstrumentResolver;
use trail_guard::monitor::{spawn_monitor, PositionMonitor, TerminationReason};
use trail_guard::notify::{CollectingNotifier, LogNotifier};
use trail_guard::risk::{NotionalSizer, Side};

#[test]
fn test_config_example_loads() {
    let config = Config::parse(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.exchange.mode, ExecutionMode::Paper);
    assert_eq!(config.stop.activation_pct, dec!(1));
    assert_eq!(config.stop.initial_stop_pct, dec!(2));
    assert_eq!(config.sizing.notional_usd, dec!(10));
    assert!(config.telemetry.metrics_port.is_none());
}

fn btc_limits() -> InstrumentLimits {
    InstrumentLimits {
        min_qty: dec!(0.001),
        qty_step: dec!(0.001),
        tick_size: dec!(0.1),
    }
}

fn fast_monitor() -> MonitorConfig {
    MonitorConfig {
        poll_interval_ms: 1000,
        position_read_attempts: 3,
        position_read_delay_ms: 100,
        initial_backoff_ms: 100,
        max_backoff_ms: 400,
        ..MonitorConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_paper_entry_trails_then_stops_out() {
    let market = ScriptedExchange::new().with_instrument("BTCUSDT", btc_limits());
    // sizing read, fill, then one price per monitor tick
    market
        .push_prices([
            dec!(100),
            dec!(100),
            dec!(100),
            dec!(101),
            dec!(110),
            dec!(105),
        ])
        .await;
    let paper = Arc::new(PaperExchange::new(Arc::new(market)));
    let exchange: Arc<dyn Exchange> = paper.clone();
    let config = fast_monitor();

    let spec = InstrumentResolver::new(exchange.clone())
        .resolve("BTCUSDT")
        .await
        .unwrap();
    let notifier = Arc::new(CollectingNotifier::new());
    let position = EntryExecutor::new(exchange.clone(), &config, notifier.clone())
        .open(&spec, Side::Long, &NotionalSizer::new(dec!(100)))
        .await
        .unwrap();
    assert_eq!(position.quantity, dec!(1));
    assert_eq!(position.entry_price, dec!(100));

    let monitor = PositionMonitor::new(
        exchange,
        spec,
        Config::default().stop,
        &config,
        notifier.clone(),
        CancellationToken::new(),
    );

    let reason = monitor.run(position).await.unwrap();
    assert_eq!(reason, TerminationReason::PositionClosed);
    assert!(paper.open_position("BTCUSDT").await.unwrap().is_none());

    let messages = notifier.messages().await;
    assert!(messages.iter().any(|m| m.contains("stop moved to 98")));
    assert!(messages.iter().any(|m| m.contains("stop moved to 100 ")));
    assert!(messages.iter().any(|m| m.contains("stop moved to 108.9")));
}

#[tokio::test(start_paused = true)]
async fn test_short_entry_cancelled() {
    let market = ScriptedExchange::new().with_instrument(
        "TOSHIUSDT",
        InstrumentLimits {
            min_qty: dec!(1),
            qty_step: dec!(1),
            tick_size: dec!(0.0000001),
        },
    );
    market.push_prices([dec!(0.0037)]).await;
    let exchange: Arc<dyn Exchange> = Arc::new(PaperExchange::new(Arc::new(market)));
    let config = fast_monitor();

    let spec = InstrumentResolver::new(exchange.clone())
        .resolve("TOSHIUSDT")
        .await
        .unwrap();
    let position = EntryExecutor::new(exchange.clone(), &config, Arc::new(LogNotifier))
        .open(&spec, Side::Short, &NotionalSizer::new(dec!(10)))
        .await
        .unwrap();
    assert_eq!(position.quantity, dec!(2702));

    let cancel = CancellationToken::new();
    let handle = spawn_monitor(
        PositionMonitor::new(
            exchange.clone(),
            spec,
            Config::default().stop,
            &config,
            Arc::new(CollectingNotifier::new()),
            cancel.clone(),
        ),
        position,
    );

    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    cancel.cancel();

    assert_eq!(
        handle.await.unwrap().unwrap(),
        TerminationReason::Cancelled
    );
    // initial stop 2% above entry, rounded to the tick
    let held = exchange.open_position("TOSHIUSDT").await.unwrap().unwrap();
    assert_eq!(held.stop_loss, Some(dec!(0.0037740)));
}
