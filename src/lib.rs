//! leverage-guard: position lifecycle and risk controls for leveraged trading
//!
//! This library provides the core components for:
//! - Position sizing from a risk budget under a leverage cap
//! - A single-position ledger with slippage, commission and SL/TP exits
//! - A risk governor with daily loss, cooldown and drawdown circuit breakers
//! - Performance analytics over closed trades and the equity curve
//! - Bar replay backtesting and a tick-driven live driver
//! - Paper order gateway with bounded retries
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod execution;
pub mod ledger;
pub mod live;
pub mod risk;
pub mod signal;
pub mod telemetry;
