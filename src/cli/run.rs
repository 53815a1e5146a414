//! Run command implementation

use anyhow::Context as _;
use clap::Args;

use super::AppContext;
use crate::feed::PositionReader;
use crate::monitor::spawn_monitor;
use crate::risk::Position;
use crate::telemetry::metrics;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Symbols whose open positions should be protected (e.g. BTCUSDT)
    #[arg(required = true)]
    pub symbols: Vec<String>,
}

impl RunArgs {
    pub async fn execute(&self, context: &AppContext) -> anyhow::Result<()> {
        context.cancel_on_ctrl_c();

        let reader = PositionReader::new(
            context.exchange.clone(),
            context.config.monitor.call_timeout(),
        );

        let mut handles = Vec::new();
        for symbol in &self.symbols {
            let symbol = symbol.to_uppercase();
            let spec = context
                .resolver
                .resolve(&symbol)
                .await
                .with_context(|| format!("resolving {symbol}"))?;

            match reader.read(&symbol).await? {
                Some(snapshot) => {
                    let position = Position::from_snapshot(&snapshot);
                    let handle = spawn_monitor(context.monitor(spec), position);
                    handles.push((symbol, handle));
                }
                None => tracing::warn!(symbol = %symbol, "No open position, skipping"),
            }
        }

        if handles.is_empty() {
            anyhow::bail!("no open positions to protect");
        }

        let mut remaining = handles.len();
        metrics::set_active_monitors(remaining);

        let mut failures = 0;
        for (symbol, handle) in handles {
            match handle.await {
                Ok(Ok(reason)) => tracing::info!(symbol = %symbol, %reason, "Monitor ended"),
                Ok(Err(e)) => {
                    tracing::error!(symbol = %symbol, error = %e, "Monitor failed to start");
                    failures += 1;
                }
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Monitor task panicked");
                    failures += 1;
                }
            }
            remaining -= 1;
            metrics::set_active_monitors(remaining);
        }

        if failures > 0 {
            anyhow::bail!("{failures} monitor(s) failed");
        }
        Ok(())
    }
}
