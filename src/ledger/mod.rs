//! Position ledger
//!
//! Owns at most one open position for a governed slot, applies fills and
//! keeps the closed-trade and equity logs. The arithmetic lives in
//! [`transition`]; [`PositionLedger`] threads the state through it and
//! forwards the emitted events to subscribers.

mod events;
mod position;
pub mod transition;

pub use events::{BroadcastSink, ChannelSink, EventLog, EventSink, LedgerEvent, TracingSink};
pub use position::{CloseReason, EquityPoint, Position, Trade};
pub use transition::{
    CostModel, FilledEntry, LedgerState, OpenRejection, OpenRequest, Transition,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{Config, ConfigError, IntrabarPolicy};
use crate::risk::{create_sizer, PositionSizer};

/// Stateful wrapper around the pure ledger transitions
pub struct PositionLedger {
    costs: CostModel,
    policy: IntrabarPolicy,
    sizer: Box<dyn PositionSizer>,
    initial_capital: Decimal,
    state: LedgerState,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl PositionLedger {
    /// Create a flat ledger from a validated configuration
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_sizer(config, create_sizer(config)))
    }

    /// Create a ledger with an explicit sizer; `config` must already be validated
    pub fn with_sizer(config: &Config, sizer: Box<dyn PositionSizer>) -> Self {
        debug!(sizer = sizer.mode_name(), "Ledger created");
        Self {
            costs: CostModel::from_config(config),
            policy: config.execution.intrabar_policy,
            sizer,
            initial_capital: config.account.initial_capital,
            state: LedgerState::flat(config.account.initial_capital),
            trades: vec![],
            equity: vec![],
            sinks: vec![],
        }
    }

    /// Register an event subscriber
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Open a position. Fails without touching any state when already open
    /// or when the sizer finds no valid size.
    pub fn open(&mut self, request: OpenRequest) -> Result<&Position, OpenRejection> {
        let transition = transition::open(&self.state, &self.costs, self.sizer.as_ref(), request)?;
        self.apply(transition);
        self.state.position.as_ref().ok_or(OpenRejection::AlreadyOpen)
    }

    /// Book an executed entry exactly as filled
    pub fn open_filled(&mut self, fill: FilledEntry) -> Result<&Position, OpenRejection> {
        let transition = transition::open_filled(&self.state, &self.costs, fill)?;
        self.apply(transition);
        self.state.position.as_ref().ok_or(OpenRejection::AlreadyOpen)
    }

    /// Position `open` would create, without changing anything
    pub fn preview_open(&self, request: OpenRequest) -> Result<Position, OpenRejection> {
        let transition = transition::open(&self.state, &self.costs, self.sizer.as_ref(), request)?;
        transition.state.position.ok_or(OpenRejection::AlreadyOpen)
    }

    /// Close the open position at `price` (before slippage)
    pub fn close(
        &mut self,
        timestamp: DateTime<Utc>,
        price: Decimal,
        reason: CloseReason,
    ) -> Option<Trade> {
        let transition = transition::close(&self.state, &self.costs, timestamp, price, reason)?;
        self.apply(transition);
        self.trades.last().cloned()
    }

    /// Close the open position at an executed exit price
    pub fn close_filled(
        &mut self,
        timestamp: DateTime<Utc>,
        exit_price: Decimal,
        reason: CloseReason,
    ) -> Option<Trade> {
        let transition =
            transition::close_filled(&self.state, &self.costs, timestamp, exit_price, reason)?;
        self.apply(transition);
        self.trades.last().cloned()
    }

    /// Close on a stop-loss or take-profit touch within the bar
    pub fn check_exits(
        &mut self,
        timestamp: DateTime<Utc>,
        high: Decimal,
        low: Decimal,
    ) -> Option<Trade> {
        let transition =
            transition::check_exits(&self.state, &self.costs, self.policy, timestamp, high, low)?;
        self.apply(transition);
        self.trades.last().cloned()
    }

    /// Stop-loss or take-profit level touched by a bar, without closing
    pub fn exit_trigger(&self, high: Decimal, low: Decimal) -> Option<(CloseReason, Decimal)> {
        let position = self.state.position.as_ref()?;
        transition::triggered_exit(position, self.policy, high, low)
    }

    /// Force-close whatever is still open when the price series ends
    pub fn finish(&mut self, timestamp: DateTime<Utc>, last_price: Decimal) -> Option<Trade> {
        self.close(timestamp, last_price, CloseReason::EndOfData)
    }

    /// Ratchet the stop; returns whether it moved
    pub fn tighten_stop(&mut self, timestamp: DateTime<Utc>, new_stop: Decimal) -> bool {
        match transition::tighten_stop(&self.state, timestamp, new_stop) {
            Some(transition) => {
                self.apply(transition);
                true
            }
            None => false,
        }
    }

    /// Append an equity sample at the current capital
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) -> EquityPoint {
        let point = EquityPoint {
            timestamp,
            equity: self.state.capital,
        };
        self.publish(LedgerEvent::Equity(point));
        point
    }

    fn apply(&mut self, transition: Transition) {
        self.state = transition.state;
        for event in transition.events {
            self.publish(event);
        }
    }

    fn publish(&mut self, event: LedgerEvent) {
        match &event {
            LedgerEvent::Closed(trade) => self.trades.push(trade.clone()),
            LedgerEvent::Equity(point) => self.equity.push(*point),
            LedgerEvent::Opened(_) | LedgerEvent::StopMoved { .. } => {}
        }
        for sink in &mut self.sinks {
            sink.publish(&event);
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.state.position.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Realized capital (net of an open position's entry commission)
    pub fn capital(&self) -> Decimal {
        self.state.capital
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Closed trades in close order
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Equity samples in record order
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity
    }

    /// Sum of closed-trade pnl
    pub fn realized_pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}
