use clap::Parser;
use trail_guard::cli::{AppContext, Cli, Commands};
use trail_guard::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    trail_guard::telemetry::init_telemetry(&config.telemetry)?;

    if let Commands::Config = cli.command {
        println!("Current configuration:");
        println!(
            "  Exchange: {:?} {} ({})",
            config.exchange.mode, config.exchange.base_url, config.exchange.category
        );
        println!(
            "  Stop: activation={}% initial={}% trailing={}% lock-in={}%",
            config.stop.activation_pct,
            config.stop.initial_stop_pct,
            config.stop.trailing_pct,
            config.stop.lock_in_pct
        );
        println!(
            "  Monitor: poll={}ms deadline={:?} attempts={}",
            config.monitor.poll_interval_ms,
            config.monitor.session_deadline_secs,
            config.monitor.max_update_attempts
        );
        println!("  Sizing: ${}", config.sizing.notional_usd);
        println!(
            "  Notify: telegram={} chats={}",
            config.notify.telegram_enabled,
            config.notify.chat_ids.len()
        );
        return Ok(());
    }

    let context = AppContext::build(config, &cli.credentials)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(symbols = ?args.symbols, "Starting position guard");
            args.execute(&context).await?;
        }
        Commands::Open(args) => {
            tracing::info!(symbol = %args.symbol, side = %args.side, "Opening position");
            args.execute(&context).await?;
        }
        Commands::Spec(args) => {
            args.execute(&context).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
