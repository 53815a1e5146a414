//! CLI interface for trail-guard
//!
//! Provides subcommands for:
//! - `run`: Protect already-open positions
//! - `open`: Open a position with a market order, then protect it
//! - `spec`: Show instrument filters and a sized quantity
//! - `config`: Show the effective configuration

mod context;
mod open;
mod run;
mod spec;

pub use context::{AppContext, CredentialArgs};
pub use open::OpenArgs;
pub use run::RunArgs;
pub use spec::SpecArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trail-guard")]
#[command(about = "Trailing stop-loss guard for Bybit linear perpetual positions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Protect open positions until they close
    Run(RunArgs),
    /// Open a position, then protect it
    Open(OpenArgs),
    /// Show instrument filters
    Spec(SpecArgs),
    /// Show configuration
    Config,
}
