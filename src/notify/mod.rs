//! Notification sinks
//!
//! Fire-and-forget chat messages about position events. Delivery
//! failures are logged and never reach the caller.

mod telegram;

pub use telegram::{TelegramConfig, TelegramNotifier, TELEGRAM_API_URL};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-util"))]
use tokio::sync::Mutex;

/// Trait for notification sinks
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message; must not block the caller on network I/O
    async fn notify(&self, text: &str);
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!(message = text, "Notification");
    }
}

/// Keeps notifications in memory
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, text: &str) {
        self.messages.lock().await.push(text.to_string());
    }
}
