//! Configuration types for trail-guard

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

use crate::exchange::BYBIT_API_URL;
use crate::monitor::RetryPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub stop: StopConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Exchange connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Shared API budget refill rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_base_url() -> String {
    BYBIT_API_URL.to_string()
}
fn default_category() -> String {
    "linear".to_string()
}
fn default_recv_window_ms() -> u64 {
    5000
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_requests_per_second() -> u32 {
    10
}
fn default_burst() -> u32 {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            base_url: default_base_url(),
            category: default_category(),
            recv_window_ms: default_recv_window_ms(),
            timeout_ms: default_timeout_ms(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Trailing-stop parameters, all in percent
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StopConfig {
    /// Favorable move from entry that arms the trailing stop
    #[serde(default = "default_activation_pct")]
    pub activation_pct: Decimal,
    /// Distance of the initial stop from entry
    #[serde(default = "default_initial_stop_pct")]
    pub initial_stop_pct: Decimal,
    /// Distance of the trailing stop from the best price
    #[serde(default = "default_trailing_pct")]
    pub trailing_pct: Decimal,
    /// Profit locked in when the stop moves to breakeven (0 = exact entry)
    #[serde(default)]
    pub lock_in_pct: Decimal,
    /// Fixed take-profit distance from entry (None = no take-profit)
    #[serde(default)]
    pub take_profit_pct: Option<Decimal>,
}

fn default_activation_pct() -> Decimal {
    dec!(1)
}
fn default_initial_stop_pct() -> Decimal {
    dec!(2)
}
fn default_trailing_pct() -> Decimal {
    dec!(1)
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            activation_pct: default_activation_pct(),
            initial_stop_pct: default_initial_stop_pct(),
            trailing_pct: default_trailing_pct(),
            lock_in_pct: Decimal::ZERO,
            take_profit_pct: None,
        }
    }
}

impl StopConfig {
    /// Check percent ranges
    pub fn validate(&self) -> Result<(), String> {
        let hundred = dec!(100);
        if self.activation_pct < Decimal::ZERO || self.lock_in_pct < Decimal::ZERO {
            return Err("percentages must be non-negative".to_string());
        }
        if self.initial_stop_pct <= Decimal::ZERO || self.initial_stop_pct >= hundred {
            return Err(format!(
                "initial_stop_pct must be in (0, 100), got {}",
                self.initial_stop_pct
            ));
        }
        if self.trailing_pct <= Decimal::ZERO || self.trailing_pct >= hundred {
            return Err(format!(
                "trailing_pct must be in (0, 100), got {}",
                self.trailing_pct
            ));
        }
        if self.lock_in_pct >= self.activation_pct && !self.lock_in_pct.is_zero() {
            return Err(format!(
                "lock_in_pct ({}) must be below activation_pct ({})",
                self.lock_in_pct, self.activation_pct
            ));
        }
        if let Some(tp) = self.take_profit_pct {
            if tp <= Decimal::ZERO {
                return Err(format!("take_profit_pct must be positive, got {}", tp));
            }
        }
        Ok(())
    }
}

/// Monitor loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Stop monitoring after this many seconds (None = until closed)
    #[serde(default)]
    pub session_deadline_secs: Option<u64>,
    #[serde(default = "default_max_update_attempts")]
    pub max_update_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Position reads while waiting for a fill to show up
    #[serde(default = "default_position_read_attempts")]
    pub position_read_attempts: u32,
    #[serde(default = "default_position_read_delay_ms")]
    pub position_read_delay_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_max_update_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    5000
}
fn default_position_read_attempts() -> u32 {
    5
}
fn default_position_read_delay_ms() -> u64 {
    1000
}
fn default_call_timeout_ms() -> u64 {
    10_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            session_deadline_secs: None,
            max_update_attempts: default_max_update_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            position_read_attempts: default_position_read_attempts(),
            position_read_delay_ms: default_position_read_delay_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl MonitorConfig {
    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be non-zero".to_string());
        }
        if self.call_timeout_ms == 0 {
            return Err("call_timeout_ms must be non-zero".to_string());
        }
        if self.max_update_attempts == 0 {
            return Err("max_update_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn session_deadline(&self) -> Option<Duration> {
        self.session_deadline_secs.map(Duration::from_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn position_read_delay(&self) -> Duration {
        Duration::from_millis(self.position_read_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_update_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

/// Entry sizing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Dollar notional per entry
    #[serde(default = "default_notional_usd")]
    pub notional_usd: Decimal,
}

fn default_notional_usd() -> Decimal {
    dec!(10)
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            notional_usd: default_notional_usd(),
        }
    }
}

/// Chat notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram_enabled: bool,
    #[serde(default)]
    pub chat_ids: Vec<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port (None = no exporter)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.stop.validate().map_err(anyhow::Error::msg)?;
        config.monitor.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}
