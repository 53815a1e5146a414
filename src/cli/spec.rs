//! Spec command implementation

use clap::Args;
use rust_decimal::Decimal;

use super::AppContext;
use crate::feed::PriceFeed;
use crate::risk::NotionalSizer;

#[derive(Args, Debug)]
pub struct SpecArgs {
    /// Symbol to look up
    pub symbol: String,

    /// Also size an order of this many dollars at the last price
    #[arg(short, long)]
    pub notional: Option<Decimal>,
}

impl SpecArgs {
    pub async fn execute(&self, context: &AppContext) -> anyhow::Result<()> {
        let symbol = self.symbol.to_uppercase();
        let spec = context.resolver.resolve(&symbol).await?;

        println!("{}", spec.symbol);
        println!("  Min quantity:  {}", spec.min_quantity);
        println!("  Quantity step: {}", spec.quantity_step);
        println!("  Tick size:     {}", spec.tick_size);
        println!("  Precision:     {}", spec.decimal_precision);

        if let Some(notional) = self.notional {
            let feed = PriceFeed::new(
                context.exchange.clone(),
                context.config.monitor.call_timeout(),
            );
            let tick = feed.latest(&symbol).await?;
            let qty = NotionalSizer::new(notional).quantity(tick.price, &spec)?;
            println!("  Last price:    {}", tick.price);
            println!("  ${} buys:      {}", notional, qty);
        }

        Ok(())
    }
}
