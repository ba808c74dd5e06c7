//! CLI interface for leverage-guard
//!
//! Provides subcommands for:
//! - `backtest`: Replay a bar file through the simulator
//! - `run`: Paper-trade a tick file through the live driver
//! - `config`: Show the effective configuration

mod backtest;
mod run;

pub use backtest::{BacktestArgs, OutputFormat};
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "leverage-guard")]
#[command(about = "Position lifecycle and risk controls for a leveraged trading slot")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines bar file and report performance
    Backtest(BacktestArgs),
    /// Paper-trade a JSON-lines tick file through the live driver
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}
