//! Live trading driver
//!
//! Feeds externally scheduled ticks through the same ledger and governor
//! transitions as the backtest, with orders routed through an
//! [`OrderGateway`](crate::execution::OrderGateway).

mod trader;

pub use trader::{LiveTrader, TickAction, TickOutcome};
