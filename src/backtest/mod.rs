//! Backtesting module
//!
//! Replays bars with signals through the same ledger and governor the live
//! driver uses, then summarizes the closed trades

mod analytics;
mod replay;
mod simulator;

pub use analytics::{BacktestResult, BacktestSummary, MetricsAggregator};
pub use replay::{BarError, BarStream, PriceBar, SignalBar};
pub use simulator::BacktestSimulator;
