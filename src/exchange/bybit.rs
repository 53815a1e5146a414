//! Bybit v5 REST client
//!
//! Implements the polled capabilities against the unified trading API for
//! USDT-linear perpetuals. Private endpoints are signed with HMAC-SHA256 over
//! `timestamp + api_key + recv_window + payload`.

use super::types::{ExchangeError, InstrumentLimits, OrderResult, PositionSnapshot};
use super::{ApiBudget, Exchange, RET_OK, RET_RATE_LIMITED};
use crate::risk::Side;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Bybit mainnet REST base URL
pub const BYBIT_API_URL: &str = "https://api.bybit.com";

/// Return code for invalid request parameters (unknown symbol included)
const RET_PARAMS_ERROR: i64 = 10001;

/// API key pair for private endpoints
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Configuration for the Bybit client
#[derive(Debug, Clone)]
pub struct BybitConfig {
    /// REST base URL
    pub base_url: String,
    /// Product category ("linear" for USDT perpetuals)
    pub category: String,
    /// Signature validity window in milliseconds
    pub recv_window_ms: u64,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            base_url: BYBIT_API_URL.to_string(),
            category: "linear".to_string(),
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for the Bybit v5 REST API
pub struct BybitClient {
    config: BybitConfig,
    credentials: Option<Credentials>,
    budget: Arc<ApiBudget>,
    client: Client,
}

impl BybitClient {
    /// Create a new client; without credentials only market data works
    pub fn new(
        config: BybitConfig,
        credentials: Option<Credentials>,
        budget: Arc<ApiBudget>,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            credentials,
            budget,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Attach v5 authentication headers for the given payload
    fn signed(&self, request: RequestBuilder, payload: &str) -> Result<RequestBuilder, ExchangeError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)?;
        let timestamp = Utc::now().timestamp_millis().to_string();
        let recv_window = self.config.recv_window_ms.to_string();
        let signature = sign(
            &creds.api_secret,
            &timestamp,
            &creds.api_key,
            &recv_window,
            payload,
        )?;

        Ok(request
            .header("X-BAPI-API-KEY", &creds.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", recv_window)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-SIGN-TYPE", "2"))
    }

    async fn get_public(&self, path: &str, query: &str) -> Result<ApiResponse, ExchangeError> {
        let request = self.client.get(format!("{}?{}", self.url(path), query));
        self.send(request).await
    }

    async fn get_signed(&self, path: &str, query: &str) -> Result<ApiResponse, ExchangeError> {
        let request = self.client.get(format!("{}?{}", self.url(path), query));
        let request = self.signed(request, query)?;
        self.send(request).await
    }

    async fn post_signed(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse, ExchangeError> {
        let body = serde_json::to_string(body).map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json");
        let request = self.signed(request, &body)?.body(body);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse, ExchangeError> {
        self.budget.acquire().await;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeError::Timeout
            } else {
                ExchangeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN {
            return Err(ExchangeError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Transport(format!("HTTP {} - {}", status, body)));
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| ExchangeError::Decode(e.to_string()))
    }

    fn symbol_query(&self, symbol: &str) -> String {
        format!("category={}&symbol={}", self.config.category, symbol)
    }

    fn trading_stop_body(
        &self,
        symbol: &str,
        stop_price: Decimal,
        take_profit: Option<Decimal>,
        position_idx: u8,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "category": self.config.category,
            "symbol": symbol,
            "stopLoss": stop_price.normalize().to_string(),
            "tpslMode": "Full",
            "slTriggerBy": "LastPrice",
            "positionIdx": position_idx,
        });
        if let Some(tp) = take_profit {
            body["takeProfit"] = serde_json::Value::String(tp.normalize().to_string());
            body["tpTriggerBy"] = serde_json::Value::String("LastPrice".to_string());
        }
        body
    }
}

#[async_trait]
impl Exchange for BybitClient {
    async fn last_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let response = self
            .get_public("/v5/market/tickers", &self.symbol_query(symbol))
            .await?;
        let tickers: TickerResult = response.into_result()?;
        parse_last_price(tickers, symbol)
    }

    async fn instrument_limits(&self, symbol: &str) -> Result<InstrumentLimits, ExchangeError> {
        let response = self
            .get_public("/v5/market/instruments-info", &self.symbol_query(symbol))
            .await?;
        if response.ret_code == RET_PARAMS_ERROR {
            return Err(ExchangeError::SymbolNotFound(symbol.to_string()));
        }
        let instruments: InstrumentResult = response.into_result()?;
        parse_instrument(instruments, symbol)
    }

    async fn open_position(&self, symbol: &str) -> Result<Option<PositionSnapshot>, ExchangeError> {
        let response = self
            .get_signed("/v5/position/list", &self.symbol_query(symbol))
            .await?;
        let positions: PositionResult = response.into_result()?;
        parse_position(positions, symbol)
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let link_id = Uuid::new_v4().simple().to_string();
        let body = serde_json::json!({
            "category": self.config.category,
            "symbol": symbol,
            "side": side.order_side(),
            "orderType": "Market",
            "qty": qty.normalize().to_string(),
            "timeInForce": "IOC",
            "reduceOnly": false,
            "orderLinkId": link_id,
        });

        tracing::info!(symbol, %side, %qty, "Placing market order");
        let response = self.post_signed("/v5/order/create", &body).await?;
        Ok(response.into_order_result())
    }

    async fn set_protective_stop(
        &self,
        symbol: &str,
        side: Side,
        stop_price: Decimal,
        take_profit: Option<Decimal>,
        position_idx: u8,
    ) -> Result<OrderResult, ExchangeError> {
        let body = self.trading_stop_body(symbol, stop_price, take_profit, position_idx);

        tracing::debug!(symbol, %side, %stop_price, ?take_profit, position_idx, "Setting trading stop");
        let response = self.post_signed("/v5/position/trading-stop", &body).await?;
        Ok(response.into_order_result())
    }
}

/// Compute the hex-encoded v5 request signature
fn sign(
    secret: &str,
    timestamp: &str,
    api_key: &str,
    recv_window: &str,
    payload: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Transport(format!("Invalid API secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(api_key.as_bytes());
    mac.update(recv_window.as_bytes());
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Common v5 response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl ApiResponse {
    /// Decode the result payload of a successful response
    fn into_result<T: DeserializeOwned>(self) -> Result<T, ExchangeError> {
        match self.ret_code {
            RET_OK => serde_json::from_value(self.result)
                .map_err(|e| ExchangeError::Decode(e.to_string())),
            RET_RATE_LIMITED => Err(ExchangeError::RateLimited),
            code => Err(ExchangeError::Api {
                code,
                message: self.ret_msg,
            }),
        }
    }

    /// Order-type calls keep the return code for the caller to interpret
    fn into_order_result(self) -> OrderResult {
        let order_id = self
            .result
            .get("orderId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        OrderResult {
            code: self.ret_code,
            message: self.ret_msg,
            order_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    #[serde(default)]
    list: Vec<TickerItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerItem {
    symbol: String,
    last_price: String,
}

#[derive(Debug, Deserialize)]
struct InstrumentResult {
    #[serde(default)]
    list: Vec<InstrumentItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentItem {
    symbol: String,
    lot_size_filter: LotSizeFilter,
    price_filter: PriceFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    min_order_qty: String,
    qty_step: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceFilter {
    tick_size: String,
}

#[derive(Debug, Deserialize)]
struct PositionResult {
    #[serde(default)]
    list: Vec<PositionItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionItem {
    symbol: String,
    #[serde(default)]
    side: String,
    size: String,
    #[serde(default)]
    avg_price: String,
    #[serde(default)]
    stop_loss: String,
    #[serde(default)]
    take_profit: String,
    #[serde(default)]
    position_idx: u8,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(value)
        .map_err(|e| ExchangeError::Decode(format!("Invalid {} '{}': {}", field, value, e)))
}

/// Empty or zero means "not set"
fn parse_optional_price(field: &str, value: &str) -> Result<Option<Decimal>, ExchangeError> {
    match value {
        "" => Ok(None),
        raw => Ok(Some(parse_decimal(field, raw)?).filter(|p| !p.is_zero())),
    }
}

fn parse_last_price(tickers: TickerResult, symbol: &str) -> Result<Decimal, ExchangeError> {
    let ticker = tickers
        .list
        .into_iter()
        .find(|t| t.symbol == symbol)
        .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;
    parse_decimal("lastPrice", &ticker.last_price)
}

fn parse_instrument(
    instruments: InstrumentResult,
    symbol: &str,
) -> Result<InstrumentLimits, ExchangeError> {
    let item = instruments
        .list
        .into_iter()
        .find(|i| i.symbol == symbol)
        .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

    Ok(InstrumentLimits {
        min_qty: parse_decimal("minOrderQty", &item.lot_size_filter.min_order_qty)?,
        qty_step: parse_decimal("qtyStep", &item.lot_size_filter.qty_step)?,
        tick_size: parse_decimal("tickSize", &item.price_filter.tick_size)?,
    })
}

fn parse_position(
    positions: PositionResult,
    symbol: &str,
) -> Result<Option<PositionSnapshot>, ExchangeError> {
    for item in positions.list.into_iter().filter(|p| p.symbol == symbol) {
        let size = parse_decimal("size", &item.size)?;
        if size <= Decimal::ZERO {
            continue;
        }
        let Some(side) = Side::from_order_side(&item.side) else {
            continue;
        };
        let stop_loss = parse_optional_price("stopLoss", &item.stop_loss)?;
        let take_profit = parse_optional_price("takeProfit", &item.take_profit)?;

        return Ok(Some(PositionSnapshot {
            symbol: item.symbol,
            side,
            entry_price: parse_decimal("avgPrice", &item.avg_price)?,
            size,
            stop_loss,
            take_profit,
            position_idx: item.position_idx,
        }));
    }
    Ok(None)
}
