//! Backtest command implementation

use anyhow::Context;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::backtest::{BacktestSimulator, BarStream};
use crate::config::Config;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// JSON-lines file of bars with signals
    #[arg(long)]
    pub bars: PathBuf,

    /// Symbol the bars belong to
    #[arg(long, default_value = "SOLUSDT")]
    pub symbol: String,

    /// Initial capital, overriding the config
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Directory for trades.json and equity.json
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format: json or table
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl BacktestArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(capital) = self.capital {
            config.account.initial_capital = capital;
        }
        let simulator = BacktestSimulator::new(config)?;

        let bars = BarStream::load(&self.bars)?;
        tracing::info!(bars = bars.len(), path = ?self.bars, "Loaded bars");

        let result = simulator.run(&self.symbol, bars)?;

        if let Some(dir) = &self.output {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            std::fs::write(dir.join("trades.json"), serde_json::to_string_pretty(&result.trades)?)?;
            std::fs::write(dir.join("equity.json"), serde_json::to_string_pretty(&result.equity)?)?;
            tracing::info!(dir = ?dir, "Wrote trades and equity curve");
        }

        match self.format {
            OutputFormat::Table => println!("{}", result.summary.format_table()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.summary)?),
        }
        Ok(())
    }
}
