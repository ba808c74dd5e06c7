//! Tick-driven trading across governed slots

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, Mutex};

use crate::backtest::{BacktestSummary, MetricsAggregator, PriceBar};
use crate::config::{Config, ConfigError};
use crate::execution::{Fill, GatewayError, OrderGateway, OrderRequest};
use crate::ledger::{
    BroadcastSink, CloseReason, EquityPoint, FilledEntry, LedgerEvent, OpenRejection, OpenRequest,
    Position, PositionLedger, TracingSink, Trade,
};
use crate::risk::{create_sizer, Rejection, RiskGovernor, RiskSnapshot};
use crate::signal::{Side, Signal};
use crate::telemetry::{self, GaugeMetric};

/// What the signal half of a tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    /// HOLD, or a signal agreeing with the open position
    None,
    /// A new position was opened
    Opened(Position),
    /// The open position was closed by an opposite signal
    Reversed(Trade),
    /// The governor refused the entry
    Rejected(Rejection),
    /// The sizer found no valid size
    Skipped(OpenRejection),
    /// The gateway failed; ledger and governor are unchanged
    GatewayFailed(GatewayError),
}

/// Result of one tick for one slot
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Equity sampled before anything else
    pub equity: EquityPoint,
    /// Stop-loss or take-profit close
    pub exit: Option<Trade>,
    /// New stop after a trailing ratchet
    pub stop_moved: Option<Decimal>,
    pub action: TickAction,
}

struct Desk {
    governor: RiskGovernor,
    ledgers: HashMap<String, PositionLedger>,
}

/// Live driver: one ledger per symbol, one governor across them, all behind
/// a single lock so entry checks and the awaited order are never interleaved
pub struct LiveTrader<G> {
    config: Config,
    gateway: G,
    events: BroadcastSink,
    aggregator: MetricsAggregator,
    desk: Mutex<Desk>,
}

impl<G: OrderGateway> LiveTrader<G> {
    pub fn new(config: Config, gateway: G) -> Result<Self, ConfigError> {
        let governor = RiskGovernor::new(&config)?;
        Ok(Self {
            aggregator: MetricsAggregator::new(config.analytics.annualization_factor),
            config,
            gateway,
            events: BroadcastSink::new(1024),
            desk: Mutex::new(Desk {
                governor,
                ledgers: HashMap::new(),
            }),
        })
    }

    /// Ledger events from every slot
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Process one externally scheduled tick for `symbol`
    pub async fn on_tick(
        &self,
        symbol: &str,
        bar: &PriceBar,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let mut desk = self.desk.lock().await;
        let Desk { governor, ledgers } = &mut *desk;
        let ledger = ledgers
            .entry(symbol.to_string())
            .or_insert_with(|| self.new_ledger(symbol));

        let equity = ledger.record_equity(now);
        telemetry::set_gauge(GaugeMetric::Equity, symbol, equity.equity);
        let mut outcome = TickOutcome {
            equity,
            exit: None,
            stop_moved: None,
            action: TickAction::None,
        };

        if let Some((reason, level)) = ledger.exit_trigger(bar.high, bar.low) {
            match self.flatten(ledger, governor, symbol, now, level, reason).await {
                Ok(trade) => outcome.exit = trade,
                Err(e) => {
                    outcome.action = TickAction::GatewayFailed(e);
                    return outcome;
                }
            }
        }

        if let Some(position) = ledger.position() {
            if let Some(stop) = governor.trailing_stop(position, bar.close) {
                if ledger.tighten_stop(now, stop) {
                    governor.update_stop(symbol, stop);
                    telemetry::set_gauge(GaugeMetric::StopLoss, symbol, stop);
                    outcome.stop_moved = Some(stop);
                }
            }
        }

        let Some(requested) = signal.kind.side() else {
            return outcome;
        };

        if let Some(position) = ledger.position() {
            if requested != position.side && governor.validate_signal(signal).is_ok() {
                outcome.action = match self
                    .flatten(ledger, governor, symbol, now, bar.close, CloseReason::Signal)
                    .await
                {
                    Ok(Some(trade)) => TickAction::Reversed(trade),
                    Ok(None) => TickAction::None,
                    Err(e) => TickAction::GatewayFailed(e),
                };
            }
            return outcome;
        }

        outcome.action = self.enter(ledger, governor, symbol, bar, signal, now).await;
        outcome
    }

    /// Close `symbol`'s position at `last_price` because its feed ended
    pub async fn finish(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        last_price: Decimal,
    ) -> Result<Option<Trade>, GatewayError> {
        let mut desk = self.desk.lock().await;
        let Desk { governor, ledgers } = &mut *desk;
        match ledgers.get_mut(symbol) {
            Some(ledger) => {
                self.flatten(ledger, governor, symbol, now, last_price, CloseReason::EndOfData)
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> RiskSnapshot {
        self.desk.lock().await.governor.snapshot(now)
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        let desk = self.desk.lock().await;
        desk.ledgers.get(symbol)?.position().cloned()
    }

    pub async fn trades(&self, symbol: &str) -> Vec<Trade> {
        let desk = self.desk.lock().await;
        desk.ledgers
            .get(symbol)
            .map(|ledger| ledger.trades().to_vec())
            .unwrap_or_default()
    }

    /// Performance of one slot so far
    pub async fn summary(&self, symbol: &str) -> Option<BacktestSummary> {
        let desk = self.desk.lock().await;
        let ledger = desk.ledgers.get(symbol)?;
        Some(self.aggregator.summarize(
            ledger.trades(),
            ledger.equity_curve(),
            ledger.initial_capital(),
            ledger.capital(),
        ))
    }

    fn new_ledger(&self, symbol: &str) -> PositionLedger {
        let mut ledger = PositionLedger::with_sizer(&self.config, create_sizer(&self.config));
        ledger.add_sink(Box::new(TracingSink::new(symbol)));
        ledger.add_sink(Box::new(self.events.clone()));
        tracing::info!(symbol, "Slot ledger created");
        ledger
    }

    async fn enter(
        &self,
        ledger: &mut PositionLedger,
        governor: &mut RiskGovernor,
        symbol: &str,
        bar: &PriceBar,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> TickAction {
        let side = match governor.validate_trade(signal, now) {
            Ok(side) => side,
            Err(rejection) => {
                tracing::debug!(symbol, reason = %rejection, "Entry rejected");
                telemetry::record_rejection(symbol, rejection.kind());
                return TickAction::Rejected(rejection);
            }
        };

        let stop_loss = governor.stop_loss_price(bar.close, side);
        let take_profit = governor.take_profit_price(bar.close, side);

        let preview = match ledger.preview_open(OpenRequest {
            timestamp: now,
            price: bar.close,
            side,
            stop_loss,
            take_profit,
            signal: signal.meta.clone(),
        }) {
            Ok(position) => position,
            Err(rejection) => {
                telemetry::record_rejection(symbol, "sizing");
                return TickAction::Skipped(rejection);
            }
        };

        let fill = match self
            .submit(symbol, side, preview.size, bar.close, false, now)
            .await
        {
            Ok(fill) => fill,
            Err(e) => return TickAction::GatewayFailed(e),
        };
        if fill.size != preview.size || fill.avg_price != preview.entry_price {
            tracing::info!(
                symbol,
                order_id = %fill.order_id,
                expected_size = %preview.size,
                filled_size = %fill.size,
                expected_price = %preview.entry_price,
                filled_price = %fill.avg_price,
                "Fill differs from preview"
            );
        }

        let opened = ledger
            .open_filled(FilledEntry {
                timestamp: now,
                side,
                price: fill.avg_price,
                size: fill.size,
                stop_loss,
                take_profit,
                signal: signal.meta.clone(),
            })
            .cloned();
        match opened {
            Ok(position) => {
                governor.register_open(symbol, &position);
                telemetry::set_gauge(
                    GaugeMetric::OpenPositions,
                    symbol,
                    Decimal::from(governor.state().open_positions.len()),
                );
                TickAction::Opened(position)
            }
            Err(rejection) => {
                tracing::error!(
                    symbol,
                    order_id = %fill.order_id,
                    reason = %rejection,
                    "Fill could not be booked, unwinding"
                );
                telemetry::record_rejection(symbol, "fill");
                if fill.size > Decimal::ZERO {
                    if let Err(e) = self
                        .submit(symbol, side.opposite(), fill.size, fill.avg_price, true, now)
                        .await
                    {
                        tracing::error!(symbol, order_id = %fill.order_id, "Unwind failed");
                        return TickAction::GatewayFailed(e);
                    }
                }
                TickAction::Skipped(rejection)
            }
        }
    }

    /// Submit the closing order, then book the close
    async fn flatten(
        &self,
        ledger: &mut PositionLedger,
        governor: &mut RiskGovernor,
        symbol: &str,
        now: DateTime<Utc>,
        price: Decimal,
        reason: CloseReason,
    ) -> Result<Option<Trade>, GatewayError> {
        let Some(position) = ledger.position() else {
            return Ok(None);
        };
        let (side, size) = (position.side.opposite(), position.size);
        let fill = self.submit(symbol, side, size, price, true, now).await?;
        if fill.size != size {
            tracing::warn!(
                symbol,
                order_id = %fill.order_id,
                expected = %size,
                filled = %fill.size,
                "Closing fill size differs from position"
            );
        }

        // Stops and targets book at their level, slipped, so live and replay agree.
        let trade = match reason {
            CloseReason::StopLoss | CloseReason::TakeProfit => ledger.close(now, price, reason),
            CloseReason::Signal | CloseReason::EndOfData => {
                ledger.close_filled(now, fill.avg_price, reason)
            }
        };
        if let Some(trade) = &trade {
            governor.on_trade_closed(symbol, trade, now);
            telemetry::record_trade_closed(symbol, reason);
            telemetry::set_gauge(GaugeMetric::DailyPnl, symbol, governor.state().daily_pnl);
            telemetry::set_gauge(
                GaugeMetric::GovernorCapital,
                symbol,
                governor.state().current_capital,
            );
        }
        Ok(trade)
    }

    async fn submit(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        reference_price: Decimal,
        reduce_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Fill, GatewayError> {
        let started = Instant::now();
        let result = self
            .gateway
            .submit_market(OrderRequest {
                symbol: symbol.to_string(),
                side,
                size,
                reference_price,
                reduce_only,
                timestamp: now,
            })
            .await;
        telemetry::record_order_latency(started.elapsed());
        if let Err(e) = &result {
            tracing::warn!(symbol, %side, %size, error = %e, "Order failed");
        }
        result
    }
}
