//! Run command implementation

use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::backtest::BarStream;
use crate::config::{Config, ExecutionMode};
use crate::execution::{PaperGateway, RetryingGateway};
use crate::live::{LiveTrader, TickAction};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON-lines file of ticks with signals, processed in order
    #[arg(long)]
    pub ticks: PathBuf,

    /// Symbol the ticks belong to
    #[arg(long, default_value = "SOLUSDT")]
    pub symbol: String,

    /// Initial capital, overriding the config
    #[arg(long)]
    pub capital: Option<Decimal>,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if let Some(capital) = self.capital {
            config.account.initial_capital = capital;
        }
        if config.execution.mode == ExecutionMode::Live {
            anyhow::bail!("no venue gateway is configured; set execution.mode = \"paper\"");
        }

        let paper = PaperGateway::from_config(&config.execution);
        let gateway = RetryingGateway::from_config(paper, &config.execution);
        let trader = LiveTrader::new(config, gateway)?;
        tracing::info!(symbol = %self.symbol, "Starting paper trading");

        let mut last = None;
        for tick in BarStream::open(&self.ticks)? {
            let tick = tick?;
            let bar = tick.bar();
            let outcome = trader.on_tick(&self.symbol, &bar, &tick.signal(), bar.timestamp).await;
            if let TickAction::GatewayFailed(e) = &outcome.action {
                tracing::warn!(at = %bar.timestamp, error = %e, "Tick left unprocessed");
            }
            last = Some(bar);
        }

        if let Some(bar) = last {
            trader.finish(&self.symbol, bar.timestamp, bar.close).await?;
            let snapshot = trader.snapshot(bar.timestamp).await;
            tracing::info!(
                capital = %snapshot.current_capital,
                daily_pnl = %snapshot.daily_pnl,
                "Paper session finished"
            );
        }

        if let Some(summary) = trader.summary(&self.symbol).await {
            println!("{}", summary.format_table());
        }
        Ok(())
    }
}
