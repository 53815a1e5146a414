//! Open command implementation

use anyhow::Context as _;
use clap::Args;
use rust_decimal::Decimal;

use super::AppContext;
use crate::execution::EntryExecutor;
use crate::risk::{NotionalSizer, Side};

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Symbol to trade (e.g. TOSHIUSDT)
    pub symbol: String,

    /// Position side: long/buy or short/sell
    pub side: Side,

    /// Dollar notional (defaults to sizing.notional_usd)
    #[arg(short, long)]
    pub notional: Option<Decimal>,

    /// Open the position without monitoring it
    #[arg(long)]
    pub no_monitor: bool,
}

impl OpenArgs {
    pub async fn execute(&self, context: &AppContext) -> anyhow::Result<()> {
        let symbol = self.symbol.to_uppercase();
        let sizer = match self.notional {
            Some(notional) => NotionalSizer::new(notional),
            None => NotionalSizer::from_config(&context.config.sizing),
        };

        let spec = context
            .resolver
            .resolve(&symbol)
            .await
            .with_context(|| format!("resolving {symbol}"))?;

        let executor = EntryExecutor::new(
            context.exchange.clone(),
            &context.config.monitor,
            context.notifier.clone(),
        );
        let position = executor.open(&spec, self.side, &sizer).await?;

        context
            .notifier
            .notify(&format!(
                "Opened {} {} {} at {}",
                position.side, position.quantity, position.symbol, position.entry_price
            ))
            .await;

        if self.no_monitor {
            return Ok(());
        }

        context.cancel_on_ctrl_c();
        let reason = context.monitor(spec).run(position).await?;
        tracing::info!(symbol = %symbol, %reason, "Monitor ended");
        Ok(())
    }
}
