//! Backtest analytics and reporting

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::ledger::{CloseReason, EquityPoint, Trade};

/// Summary statistics from backtest
#[derive(Debug, Clone, Default, Serialize)]
pub struct BacktestSummary {
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    /// Sum of trade pnl
    pub total_pnl: Decimal,
    /// Total return relative to initial capital, in percent
    pub total_return_pct: Decimal,
    /// Total number of trades
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction of trades with positive pnl (0.0 - 1.0)
    pub win_rate: Decimal,
    pub avg_pnl: Decimal,
    /// Mean of winning pnl, 0 without winners
    pub avg_win: Decimal,
    /// Mean of losing pnl (negative), 0 without losers
    pub avg_loss: Decimal,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
    pub gross_profit: Decimal,
    /// Absolute sum of losing pnl
    pub gross_loss: Decimal,
    /// Gross profit over gross loss; infinite when nothing was lost
    pub profit_factor: f64,
    /// Deepest equity decline from its running peak, in percent (<= 0)
    pub max_drawdown_pct: Decimal,
    /// Annualized mean over population deviation of trade returns
    pub sharpe_ratio: f64,
    /// Average trade duration in seconds
    pub avg_trade_duration_secs: i64,
    /// Commissions paid at entry and exit
    pub total_fees: Decimal,
    pub stop_loss_exits: usize,
    pub take_profit_exits: usize,
    pub signal_exits: usize,
    pub end_of_data_exits: usize,
}

/// Complete backtest results
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Summary statistics
    pub summary: BacktestSummary,
    /// Closed trades in close order
    pub trades: Vec<Trade>,
    /// One equity sample per processed bar
    pub equity: Vec<EquityPoint>,
}

/// Derives performance statistics from a trade log and equity series
#[derive(Debug, Clone, Copy)]
pub struct MetricsAggregator {
    annualization_factor: f64,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self {
            annualization_factor: 252.0,
        }
    }
}

impl MetricsAggregator {
    pub fn new(annualization_factor: Decimal) -> Self {
        Self {
            annualization_factor: annualization_factor.to_f64().unwrap_or(252.0),
        }
    }

    /// Summarize a finished run
    pub fn summarize(
        &self,
        trades: &[Trade],
        equity: &[EquityPoint],
        initial_capital: Decimal,
        final_capital: Decimal,
    ) -> BacktestSummary {
        let mut summary = BacktestSummary {
            initial_capital,
            final_capital,
            max_drawdown_pct: max_drawdown_pct(equity),
            ..Default::default()
        };
        if initial_capital > Decimal::ZERO {
            summary.total_return_pct =
                (final_capital - initial_capital) / initial_capital * dec!(100);
        }
        if trades.is_empty() {
            return summary;
        }

        let count = Decimal::from(trades.len());
        summary.total_trades = trades.len();

        let mut total_duration = 0i64;
        for trade in trades {
            summary.total_pnl += trade.pnl;
            summary.total_fees += trade.fees();
            total_duration += trade.duration_secs;

            if trade.is_win() {
                summary.winning_trades += 1;
                summary.gross_profit += trade.pnl;
            } else if trade.pnl < Decimal::ZERO {
                summary.losing_trades += 1;
                summary.gross_loss += trade.pnl.abs();
            }

            match trade.close_reason {
                CloseReason::StopLoss => summary.stop_loss_exits += 1,
                CloseReason::TakeProfit => summary.take_profit_exits += 1,
                CloseReason::Signal => summary.signal_exits += 1,
                CloseReason::EndOfData => summary.end_of_data_exits += 1,
            }
        }

        summary.win_rate = Decimal::from(summary.winning_trades) / count;
        summary.avg_pnl = summary.total_pnl / count;
        if summary.winning_trades > 0 {
            summary.avg_win = summary.gross_profit / Decimal::from(summary.winning_trades);
        }
        if summary.losing_trades > 0 {
            summary.avg_loss = -summary.gross_loss / Decimal::from(summary.losing_trades);
        }
        summary.best_trade = trades.iter().map(|t| t.pnl).max().unwrap_or_default();
        summary.worst_trade = trades.iter().map(|t| t.pnl).min().unwrap_or_default();
        summary.profit_factor = profit_factor(summary.gross_profit, summary.gross_loss);
        summary.sharpe_ratio = self.sharpe_ratio(trades);
        summary.avg_trade_duration_secs = total_duration / trades.len() as i64;

        summary
    }

    fn sharpe_ratio(&self, trades: &[Trade]) -> f64 {
        if trades.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = trades
            .iter()
            .map(|t| t.return_pct.to_f64().unwrap_or(0.0))
            .collect();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 || !std_dev.is_finite() {
            return 0.0;
        }
        mean / std_dev * self.annualization_factor.sqrt()
    }
}

fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> f64 {
    if gross_profit <= Decimal::ZERO {
        0.0
    } else if gross_loss.is_zero() {
        f64::INFINITY
    } else {
        (gross_profit / gross_loss).to_f64().unwrap_or(f64::INFINITY)
    }
}

fn max_drawdown_pct(equity: &[EquityPoint]) -> Decimal {
    let mut peak = match equity.first() {
        Some(point) => point.equity,
        None => return Decimal::ZERO,
    };
    let mut worst = Decimal::ZERO;
    for point in equity {
        peak = peak.max(point.equity);
        if peak > Decimal::ZERO {
            let drawdown = (point.equity - peak) / peak * dec!(100);
            worst = worst.min(drawdown);
        }
    }
    worst
}

impl BacktestSummary {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Initial Capital:  {:.2}
Final Capital:    {:.2}
Net P&L:          {:+.2} ({:+.2}%)
Sharpe Ratio:     {:.2}
Max Drawdown:     {:.2}%
Win Rate:         {:.1}%
Profit Factor:    {:.2}
Fees Paid:        {:.4}

TRADES
───────────────────────────────────────────────────────
Total Trades:     {} ({} won, {} lost)
Average P&L:      {:+.4}
Average Win:      {:+.4}
Average Loss:     {:+.4}
Best Trade:       {:+.4}
Worst Trade:      {:+.4}
Avg Duration:     {}s

EXITS
───────────────────────────────────────────────────────
Stop Loss:        {}
Take Profit:      {}
Signal:           {}
End of Data:      {}
══════════════════════════════════════════════════════
"#,
            self.initial_capital,
            self.final_capital,
            self.total_pnl,
            self.total_return_pct,
            self.sharpe_ratio,
            self.max_drawdown_pct,
            self.win_rate * dec!(100),
            self.profit_factor,
            self.total_fees,
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.avg_pnl,
            self.avg_win,
            self.avg_loss,
            self.best_trade,
            self.worst_trade,
            self.avg_trade_duration_secs,
            self.stop_loss_exits,
            self.take_profit_exits,
            self.signal_exits,
            self.end_of_data_exits,
        )
    }
}
