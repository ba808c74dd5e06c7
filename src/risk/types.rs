//! Risk management types

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::signal::SignalKind;

/// Why the governor refused an entry. These are routine outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum Rejection {
    /// Every slot already holds a position
    #[error("max open positions reached ({max})")]
    MaxPositionsReached { max: usize },
    /// Today's realized losses hit the daily limit
    #[error("daily loss limit reached ({loss_pct:.2}%)")]
    DailyLossLimit { loss_pct: Decimal },
    /// A loss happened too recently
    #[error("cooldown period active ({remaining_secs}s remaining)")]
    Cooldown { remaining_secs: i64 },
    /// Capital fell through the drawdown floor; waiting does not clear this
    #[error("insufficient capital (drawdown circuit breaker at {floor})")]
    DrawdownHalt { floor: Decimal },
    /// HOLD or another non-directional signal
    #[error("signal {0:?} is not actionable")]
    NotDirectional(SignalKind),
    /// Confidence under the configured threshold
    #[error("low confidence ({confidence} < {threshold})")]
    LowConfidence {
        confidence: Decimal,
        threshold: Decimal,
    },
}

impl Rejection {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MaxPositionsReached { .. } => "max_positions",
            Rejection::DailyLossLimit { .. } => "daily_loss",
            Rejection::Cooldown { .. } => "cooldown",
            Rejection::DrawdownHalt { .. } => "drawdown_halt",
            Rejection::NotDirectional(_) => "not_directional",
            Rejection::LowConfidence { .. } => "low_confidence",
        }
    }
}
