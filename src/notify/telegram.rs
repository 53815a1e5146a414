//! Telegram Bot API notifier

use super::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Configuration for the Telegram notifier
#[derive(Clone)]
pub struct TelegramConfig {
    pub base_url: String,
    pub bot_token: String,
    pub chat_ids: Vec<String>,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_ids: Vec<String>) -> Self {
        Self {
            base_url: TELEGRAM_API_URL.to_string(),
            bot_token: bot_token.into(),
            chat_ids,
            timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("base_url", &self.base_url)
            .field("bot_token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends each notification to every configured chat
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.base_url, self.config.bot_token
        )
    }

    async fn send(client: Client, url: String, chat_id: String, text: String) {
        let body = SendMessage {
            chat_id: &chat_id,
            text: &text,
        };
        match client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(chat_id = %chat_id, "Telegram message sent");
            }
            Ok(resp) => {
                tracing::warn!(chat_id = %chat_id, status = %resp.status(), "Telegram rejected message");
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Telegram send failed");
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        let url = self.send_url();
        for chat_id in &self.config.chat_ids {
            tokio::spawn(Self::send(
                self.client.clone(),
                url.clone(),
                chat_id.clone(),
                text.to_string(),
            ));
        }
    }
}
