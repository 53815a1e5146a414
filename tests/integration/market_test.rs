//! Instrument and sizing integration tests

use std::sync::Arc;

use rust_decimal_macros::dec;
use trail_guard::exchange::{InstrumentLimits, ScriptedExchange};
use trail_guard::market::{InstrumentResolver, ResolveError};
use trail_guard::risk::{size_quantity, NotionalSizer, SizingError};

fn exchange() -> ScriptedExchange {
    ScriptedExchange::new()
        .with_instrument(
            "TOSHIUSDT",
            InstrumentLimits {
                min_qty: dec!(1),
                qty_step: dec!(1),
                tick_size: dec!(0.0000001),
            },
        )
        .with_instrument(
            "BTCUSDT",
            InstrumentLimits {
                min_qty: dec!(0.001),
                qty_step: dec!(0.001),
                tick_size: dec!(0.1),
            },
        )
}

#[tokio::test]
async fn test_resolve_then_size() {
    let resolver = InstrumentResolver::new(Arc::new(exchange()));

    let toshi = resolver.resolve("TOSHIUSDT").await.unwrap();
    assert_eq!(size_quantity(dec!(10), dec!(0.0037), &toshi).unwrap(), dec!(2702));

    let btc = resolver.resolve("BTCUSDT").await.unwrap();
    assert_eq!(btc.decimal_precision, 3);
    let sizer = NotionalSizer::new(dec!(250));
    assert_eq!(sizer.quantity(dec!(64321.5), &btc).unwrap(), dec!(0.003));
    // below the minimum notional, clamp up
    assert_eq!(
        NotionalSizer::new(dec!(5)).quantity(dec!(64321.5), &btc).unwrap(),
        dec!(0.001)
    );

    assert_eq!(resolver.cached().await, 2);
}

#[tokio::test]
async fn test_unknown_symbol_is_setup_error() {
    let resolver = InstrumentResolver::new(Arc::new(exchange()));
    assert!(matches!(
        resolver.resolve("DOGEUSDT").await,
        Err(ResolveError::SymbolNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_inputs() {
    let resolver = InstrumentResolver::new(Arc::new(exchange()));
    let btc = resolver.resolve("BTCUSDT").await.unwrap();
    assert!(matches!(
        size_quantity(dec!(-1), dec!(100), &btc),
        Err(SizingError::InvalidInput(_))
    ));
}
