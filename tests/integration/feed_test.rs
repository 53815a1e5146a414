//! Feed integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trail_guard::exchange::{
    Exchange, ExchangeError, InstrumentLimits, OrderResult, PaperExchange, PositionSnapshot,
    ScriptedExchange,
};
use trail_guard::feed::{FeedError, PositionReader, PriceFeed};
use trail_guard::risk::Side;

/// Exchange that never answers within a reasonable time
struct StalledExchange;

#[async_trait]
impl Exchange for StalledExchange {
    async fn last_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(dec!(1))
    }

    async fn instrument_limits(&self, symbol: &str) -> Result<InstrumentLimits, ExchangeError> {
        Err(ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    async fn open_position(&self, _symbol: &str) -> Result<Option<PositionSnapshot>, ExchangeError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }

    async fn place_market_order(
        &self,
        _symbol: &str,
        _side: Side,
        _qty: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        Err(ExchangeError::Timeout)
    }

    async fn set_protective_stop(
        &self,
        _symbol: &str,
        _side: Side,
        _stop_price: Decimal,
        _take_profit: Option<Decimal>,
        _position_idx: u8,
    ) -> Result<OrderResult, ExchangeError> {
        Err(ExchangeError::Timeout)
    }
}

#[tokio::test(start_paused = true)]
async fn test_price_read_times_out() {
    let feed = PriceFeed::new(Arc::new(StalledExchange), Duration::from_secs(2));
    assert_eq!(feed.latest("BTCUSDT").await.unwrap_err(), FeedError::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_position_read_times_out() {
    let reader = PositionReader::new(Arc::new(StalledExchange), Duration::from_secs(2));
    assert_eq!(reader.read("BTCUSDT").await.unwrap_err(), FeedError::Timeout);
}

#[tokio::test]
async fn test_paper_position_visible_to_reader() {
    let market = ScriptedExchange::new();
    market.push_prices([dec!(2500)]).await;
    let paper = Arc::new(PaperExchange::new(Arc::new(market)));

    let reader = PositionReader::new(paper.clone(), Duration::from_secs(1));
    assert!(reader.read("ETHUSDT").await.unwrap().is_none());

    paper
        .place_market_order("ETHUSDT", Side::Long, dec!(0.04))
        .await
        .unwrap();

    let position = reader.read("ETHUSDT").await.unwrap().unwrap();
    assert_eq!(position.side, Side::Long);
    assert_eq!(position.size, dec!(0.04));
    assert_eq!(position.entry_price, dec!(2500));
}
