//! Position and trade records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signal::{Side, SignalMeta};

/// An open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Sequence number within the owning ledger
    pub id: u64,
    /// Trade side
    pub side: Side,
    /// Entry timestamp
    pub entry_time: DateTime<Utc>,
    /// Entry price after slippage
    pub entry_price: Decimal,
    /// Position size in units
    pub size: Decimal,
    /// size * entry_price
    pub notional: Decimal,
    /// Protective stop
    pub stop_loss: Decimal,
    /// Profit target
    pub take_profit: Decimal,
    /// Commission charged at entry
    pub entry_commission: Decimal,
    /// Metadata of the signal that opened the position
    pub signal: SignalMeta,
}

impl Position {
    /// Mark-to-market P&L before exit costs
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Direction-adjusted price move since entry, in percent
    pub fn unrealized_pct(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) / self.entry_price * dec!(100) * self.side.sign()
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Opposite directional signal
    Signal,
    /// Stop-loss level reached
    StopLoss,
    /// Take-profit level reached
    TakeProfit,
    /// Price series ended with the position still open
    EndOfData,
}

impl CloseReason {
    /// Stable label for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Signal => "signal",
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Id of the position this trade closed
    pub position_id: u64,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Holding time in whole seconds
    pub duration_secs: i64,
    /// Entry price after slippage
    pub entry_price: Decimal,
    /// Exit price after slippage
    pub exit_price: Decimal,
    pub size: Decimal,
    /// Realized P&L net of entry and exit commission
    pub pnl: Decimal,
    /// pnl relative to capital after the close, in percent
    pub pnl_pct: Decimal,
    /// Direction-adjusted price return, in percent
    pub return_pct: Decimal,
    pub entry_commission: Decimal,
    pub exit_commission: Decimal,
    pub close_reason: CloseReason,
    pub signal: SignalMeta,
}

impl Trade {
    /// Whether the trade made money after costs
    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// Total commission paid
    pub fn fees(&self) -> Decimal {
        self.entry_commission + self.exit_commission
    }
}

/// A point on the equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Realized capital at `timestamp`
    pub equity: Decimal,
}
