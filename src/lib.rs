//! trail-guard: trailing stop-loss guard for Bybit linear perpetual positions
//!
//! This library provides the core components for:
//! - Instrument filter resolution and exchange-legal quantity sizing
//! - Polled price and position feeds
//! - The Initial → Armed → Trailing stop state machine
//! - Idempotent protective-stop updates and market entries
//! - A cancellable, deadline-bounded monitor loop per position
//! - Bybit v5 REST, paper and scripted exchanges
//! - Telegram notifications and the observability stack

pub mod cli;
pub mod config;
pub mod exchange;
pub mod execution;
pub mod feed;
pub mod market;
pub mod monitor;
pub mod notify;
pub mod risk;
pub mod stop;
pub mod telemetry;
