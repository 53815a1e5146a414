//! Shared command context: exchange, resolver, notifier and cancellation

use std::sync::Arc;

use anyhow::Context as _;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExecutionMode};
use crate::exchange::{ApiBudget, BybitClient, BybitConfig, Credentials, Exchange, PaperExchange};
use crate::market::{InstrumentResolver, InstrumentSpec};
use crate::monitor::PositionMonitor;
use crate::notify::{LogNotifier, Notifier, TelegramConfig, TelegramNotifier};

/// Secrets, read from the environment (or `.env`) when not passed
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Bybit API key
    #[arg(long, env = "BYBIT_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Bybit API secret
    #[arg(long, env = "BYBIT_API_SECRET", hide_env_values = true, global = true)]
    pub api_secret: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, global = true)]
    pub telegram_token: Option<String>,
}

impl CredentialArgs {
    fn bybit(&self) -> Option<Credentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}

/// Everything a command needs, built once from config and credentials
pub struct AppContext {
    pub config: Config,
    pub exchange: Arc<dyn Exchange>,
    pub resolver: InstrumentResolver,
    pub notifier: Arc<dyn Notifier>,
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn build(config: Config, credentials: &CredentialArgs) -> anyhow::Result<Self> {
        let exchange_config = &config.exchange;
        let budget = Arc::new(ApiBudget::new(
            exchange_config.requests_per_second,
            exchange_config.burst,
        ));

        let bybit_config = BybitConfig {
            base_url: exchange_config.base_url.clone(),
            category: exchange_config.category.clone(),
            recv_window_ms: exchange_config.recv_window_ms,
            timeout: exchange_config.timeout(),
        };
        let creds = credentials.bybit();

        let exchange: Arc<dyn Exchange> = match exchange_config.mode {
            ExecutionMode::Live => {
                let creds = creds
                    .context("live mode requires BYBIT_API_KEY and BYBIT_API_SECRET")?;
                Arc::new(BybitClient::new(bybit_config, Some(creds), budget)?)
            }
            ExecutionMode::Paper => {
                let market = BybitClient::new(bybit_config, creds, budget)?;
                Arc::new(PaperExchange::new(Arc::new(market)))
            }
        };
        tracing::info!(mode = ?exchange_config.mode, base_url = %exchange_config.base_url, "Exchange ready");

        let notifier: Arc<dyn Notifier> = match (&credentials.telegram_token, config.notify.telegram_enabled) {
            (Some(token), true) if !config.notify.chat_ids.is_empty() => {
                let telegram = TelegramConfig::new(token.clone(), config.notify.chat_ids.clone());
                Arc::new(TelegramNotifier::new(telegram)?)
            }
            (_, true) => {
                tracing::warn!("Telegram enabled but token or chat ids missing, logging notifications only");
                Arc::new(LogNotifier)
            }
            _ => Arc::new(LogNotifier),
        };

        Ok(Self {
            resolver: InstrumentResolver::new(exchange.clone()),
            exchange,
            notifier,
            cancel: CancellationToken::new(),
            config,
        })
    }

    /// Monitor wired to this context's exchange, notifier and cancellation
    pub fn monitor(&self, spec: InstrumentSpec) -> PositionMonitor {
        PositionMonitor::new(
            self.exchange.clone(),
            spec,
            self.config.stop.clone(),
            &self.config.monitor,
            self.notifier.clone(),
            self.cancel.clone(),
        )
    }

    /// Cancel every monitor on Ctrl-C
    pub fn cancel_on_ctrl_c(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, stopping monitors");
                cancel.cancel();
            }
        });
    }
}
