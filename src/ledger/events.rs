//! Ledger events and the sinks that receive them
//!
//! Every state change produces a [`LedgerEvent`]. Consumers (dashboards,
//! notifiers, log shippers) subscribe through an [`EventSink`] and never see
//! ledger internals.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use super::position::{EquityPoint, Position, Trade};

/// Something that happened to a ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// FLAT -> OPEN
    Opened(Position),
    /// OPEN -> FLAT
    Closed(Trade),
    /// Trailing ratchet moved the stop
    StopMoved {
        position_id: u64,
        timestamp: DateTime<Utc>,
        from: Decimal,
        to: Decimal,
    },
    /// Equity sample recorded
    Equity(EquityPoint),
}

/// Receiver of ledger events
pub trait EventSink: Send {
    /// Called once per event, in emission order
    fn publish(&mut self, event: &LedgerEvent);
}

/// In-memory event history. Clones share the same buffer, so keep one
/// handle and give the other to the ledger.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<LedgerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(events) => events.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &LedgerEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event.clone());
    }
}

/// Fan-out to any number of async subscribers. Clones publish into the same channel.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LedgerEvent>,
}

impl BroadcastSink {
    /// Create a sink with a bounded replay buffer
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&mut self, event: &LedgerEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event.clone());
    }
}

/// Single-consumer unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LedgerEvent>,
}

impl ChannelSink {
    /// Create a sink and its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LedgerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&mut self, event: &LedgerEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

/// Writes opens, closes and stop moves as structured log lines
pub struct TracingSink {
    slot: String,
}

impl TracingSink {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

impl EventSink for TracingSink {
    fn publish(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Opened(p) => tracing::info!(
                slot = %self.slot,
                side = %p.side,
                size = %p.size,
                entry = %p.entry_price,
                stop = %p.stop_loss,
                target = %p.take_profit,
                "Position opened"
            ),
            LedgerEvent::Closed(t) => tracing::info!(
                slot = %self.slot,
                side = %t.side,
                exit = %t.exit_price,
                pnl = %t.pnl,
                reason = %t.close_reason,
                "Position closed"
            ),
            LedgerEvent::StopMoved { from, to, .. } => tracing::info!(
                slot = %self.slot,
                from = %from,
                to = %to,
                "Trailing stop updated"
            ),
            LedgerEvent::Equity(point) => {
                tracing::trace!(slot = %self.slot, equity = %point.equity, "Equity")
            }
        }
    }
}
