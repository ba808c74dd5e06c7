//! Pure FLAT/OPEN transitions
//!
//! Each function takes the current [`LedgerState`] by reference and returns
//! the next state together with the events it produced. Nothing here mutates
//! or logs, so a replay of the same inputs yields the same outputs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use super::events::LedgerEvent;
use super::position::{CloseReason, Position, Trade};
use crate::config::{Config, IntrabarPolicy};
use crate::risk::{PositionSizer, SizeDecision, SizingRejection, SizingRequest};
use crate::signal::{Side, SignalMeta};

/// Decimal places kept for money amounts (commissions, pnl, capital)
pub const MONEY_DP: u32 = 10;

/// Fill cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    pub commission_rate: Decimal,
    pub slippage_rate: Decimal,
}

impl CostModel {
    pub fn from_config(config: &Config) -> Self {
        Self {
            commission_rate: config.execution.commission_rate,
            slippage_rate: config.execution.slippage_rate,
        }
    }

    /// Fill price for an order that opens `side`
    pub fn entry_fill(&self, side: Side, price: Decimal) -> Decimal {
        match side {
            Side::Long => price * (Decimal::ONE + self.slippage_rate),
            Side::Short => price * (Decimal::ONE - self.slippage_rate),
        }
    }

    /// Fill price for an order that closes `side`
    pub fn exit_fill(&self, side: Side, price: Decimal) -> Decimal {
        self.entry_fill(side.opposite(), price)
    }

    /// Commission on a notional amount
    pub fn commission(&self, notional: Decimal) -> Decimal {
        (notional * self.commission_rate).round_dp(MONEY_DP)
    }
}

/// The whole mutable state of one ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    /// Realized capital, net of the open position's entry commission
    pub capital: Decimal,
    /// The open position, if any
    pub position: Option<Position>,
    /// Id given to the next opened position
    pub next_id: u64,
}

impl LedgerState {
    /// A flat ledger holding `capital`
    pub fn flat(capital: Decimal) -> Self {
        Self {
            capital,
            position: None,
            next_id: 1,
        }
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }
}

/// Next state plus what happened on the way there
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: LedgerState,
    pub events: Vec<LedgerEvent>,
}

/// Parameters of an open request
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub timestamp: DateTime<Utc>,
    /// Reference price before slippage
    pub price: Decimal,
    pub side: Side,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub signal: SignalMeta,
}

/// An executed entry, booked at its own price and size
#[derive(Debug, Clone)]
pub struct FilledEntry {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    /// Average fill price, slippage included
    pub price: Decimal,
    /// Filled amount
    pub size: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub signal: SignalMeta,
}

/// Why an open request was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpenRejection {
    /// The ledger already holds a position
    #[error("position already open")]
    AlreadyOpen,
    /// The sizer produced no tradeable size
    #[error("sizing rejected: {0}")]
    Sizing(#[from] SizingRejection),
    /// A fill reported nothing executed
    #[error("empty fill")]
    EmptyFill,
}

/// FLAT -> OPEN, sized from capital at the slipped reference price
pub fn open(
    state: &LedgerState,
    costs: &CostModel,
    sizer: &dyn PositionSizer,
    request: OpenRequest,
) -> Result<Transition, OpenRejection> {
    if state.is_open() {
        return Err(OpenRejection::AlreadyOpen);
    }

    let entry_price = costs.entry_fill(request.side, request.price);
    let size = match sizer.calculate(&SizingRequest {
        capital: state.capital,
        side: request.side,
        entry_price,
        stop_price: request.stop_loss,
    }) {
        SizeDecision::Sized { size, .. } if size > Decimal::ZERO => size,
        SizeDecision::Sized { .. } => return Err(SizingRejection::NoCapital.into()),
        SizeDecision::Rejected(rejection) => return Err(rejection.into()),
    };

    open_filled(
        state,
        costs,
        FilledEntry {
            timestamp: request.timestamp,
            side: request.side,
            price: entry_price,
            size,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            signal: request.signal,
        },
    )
}

/// FLAT -> OPEN from an executed fill. No slippage is added and the size is
/// taken as reported; commission is charged on the filled notional.
pub fn open_filled(
    state: &LedgerState,
    costs: &CostModel,
    fill: FilledEntry,
) -> Result<Transition, OpenRejection> {
    if state.is_open() {
        return Err(OpenRejection::AlreadyOpen);
    }
    if fill.price <= Decimal::ZERO {
        return Err(SizingRejection::NonPositivePrice.into());
    }
    if fill.size <= Decimal::ZERO {
        return Err(OpenRejection::EmptyFill);
    }
    let stop_valid = match fill.side {
        Side::Long => fill.stop_loss < fill.price,
        Side::Short => fill.stop_loss > fill.price,
    };
    if !stop_valid {
        return Err(SizingRejection::InvalidStopPlacement.into());
    }

    let notional = fill.size * fill.price;
    let entry_commission = costs.commission(notional);
    let position = Position {
        id: state.next_id,
        side: fill.side,
        entry_time: fill.timestamp,
        entry_price: fill.price,
        size: fill.size,
        notional,
        stop_loss: fill.stop_loss,
        take_profit: fill.take_profit,
        entry_commission,
        signal: fill.signal,
    };

    Ok(Transition {
        state: LedgerState {
            capital: state.capital - entry_commission,
            position: Some(position.clone()),
            next_id: state.next_id + 1,
        },
        events: vec![LedgerEvent::Opened(position)],
    })
}

/// OPEN -> FLAT at `price` (before slippage)
pub fn close(
    state: &LedgerState,
    costs: &CostModel,
    timestamp: DateTime<Utc>,
    price: Decimal,
    reason: CloseReason,
) -> Option<Transition> {
    let position = state.position.as_ref()?;
    let exit_price = costs.exit_fill(position.side, price);
    close_filled(state, costs, timestamp, exit_price, reason)
}

/// OPEN -> FLAT at an executed exit price, slippage already included
pub fn close_filled(
    state: &LedgerState,
    costs: &CostModel,
    timestamp: DateTime<Utc>,
    exit_price: Decimal,
    reason: CloseReason,
) -> Option<Transition> {
    let position = state.position.as_ref()?;

    let sign = position.side.sign();
    let gross = ((exit_price - position.entry_price) * position.size * sign).round_dp(MONEY_DP);
    let exit_commission = costs.commission(position.size * exit_price);
    let pnl = gross - position.entry_commission - exit_commission;

    // The entry commission was taken provisionally at open and is part of pnl,
    // so it is handed back here to avoid charging it twice.
    let capital = state.capital + position.entry_commission + pnl;

    let pnl_pct = if capital.is_zero() {
        Decimal::ZERO
    } else {
        pnl / capital * dec!(100)
    };
    let return_pct = (exit_price - position.entry_price) / position.entry_price * dec!(100) * sign;

    let trade = Trade {
        position_id: position.id,
        side: position.side,
        entry_time: position.entry_time,
        exit_time: timestamp,
        duration_secs: (timestamp - position.entry_time).num_seconds(),
        entry_price: position.entry_price,
        exit_price,
        size: position.size,
        pnl,
        pnl_pct,
        return_pct,
        entry_commission: position.entry_commission,
        exit_commission,
        close_reason: reason,
        signal: position.signal.clone(),
    };

    Some(Transition {
        state: LedgerState {
            capital,
            position: None,
            next_id: state.next_id,
        },
        events: vec![LedgerEvent::Closed(trade)],
    })
}

/// Which exit, if any, a bar with these extremes triggers
pub fn triggered_exit(
    position: &Position,
    policy: IntrabarPolicy,
    high: Decimal,
    low: Decimal,
) -> Option<(CloseReason, Decimal)> {
    let (stop_hit, target_hit) = match position.side {
        Side::Long => (low <= position.stop_loss, high >= position.take_profit),
        Side::Short => (high >= position.stop_loss, low <= position.take_profit),
    };
    let stop = (CloseReason::StopLoss, position.stop_loss);
    let target = (CloseReason::TakeProfit, position.take_profit);

    match policy {
        IntrabarPolicy::StopFirst if stop_hit => Some(stop),
        IntrabarPolicy::StopFirst if target_hit => Some(target),
        IntrabarPolicy::TargetFirst if target_hit => Some(target),
        IntrabarPolicy::TargetFirst if stop_hit => Some(stop),
        _ => None,
    }
}

/// OPEN -> FLAT if the bar touched the stop or the target
pub fn check_exits(
    state: &LedgerState,
    costs: &CostModel,
    policy: IntrabarPolicy,
    timestamp: DateTime<Utc>,
    high: Decimal,
    low: Decimal,
) -> Option<Transition> {
    let position = state.position.as_ref()?;
    let (reason, level) = triggered_exit(position, policy, high, low)?;
    close(state, costs, timestamp, level, reason)
}

/// Move the stop to `new_stop` if that is strictly tighter
pub fn tighten_stop(
    state: &LedgerState,
    timestamp: DateTime<Utc>,
    new_stop: Decimal,
) -> Option<Transition> {
    let position = state.position.as_ref()?;
    let tighter = match position.side {
        Side::Long => new_stop > position.stop_loss,
        Side::Short => new_stop < position.stop_loss,
    };
    if !tighter {
        return None;
    }

    let from = position.stop_loss;
    let mut next = state.clone();
    if let Some(pos) = next.position.as_mut() {
        pos.stop_loss = new_stop;
    }
    Some(Transition {
        state: next,
        events: vec![LedgerEvent::StopMoved {
            position_id: position.id,
            timestamp,
            from,
            to: new_stop,
        }],
    })
}
