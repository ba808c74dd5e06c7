//! Backtest simulator engine

use chrono::{DateTime, Utc};

use super::{BacktestResult, MetricsAggregator, PriceBar, SignalBar};
use crate::config::{Config, ConfigError};
use crate::ledger::{CloseReason, EventSink, OpenRequest, PositionLedger, Trade};
use crate::risk::RiskGovernor;
use crate::signal::Signal;
use crate::telemetry::{self, GaugeMetric};

/// Runs backtest simulation over a single symbol
pub struct BacktestSimulator {
    config: Config,
    aggregator: MetricsAggregator,
}

impl BacktestSimulator {
    /// Create a new simulator from a configuration that passes validation
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let aggregator = MetricsAggregator::new(config.analytics.annualization_factor);
        Ok(Self { config, aggregator })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the backtest. Every run starts from a fresh ledger and governor.
    pub fn run(
        &self,
        symbol: &str,
        bars: impl IntoIterator<Item = SignalBar>,
    ) -> Result<BacktestResult, ConfigError> {
        self.run_with_sinks(symbol, bars, vec![])
    }

    /// Run the backtest, forwarding ledger events to `sinks`
    pub fn run_with_sinks(
        &self,
        symbol: &str,
        bars: impl IntoIterator<Item = SignalBar>,
        sinks: Vec<Box<dyn EventSink>>,
    ) -> Result<BacktestResult, ConfigError> {
        let mut ledger = PositionLedger::new(&self.config)?;
        for sink in sinks {
            ledger.add_sink(sink);
        }
        let mut governor = RiskGovernor::new(&self.config)?;

        tracing::info!(
            symbol,
            capital = %ledger.initial_capital(),
            sizing = ?self.config.risk.sizing_mode,
            "Starting backtest"
        );

        let mut last: Option<PriceBar> = None;
        let mut processed = 0usize;
        for signal_bar in bars {
            let bar = signal_bar.bar();
            step(&mut ledger, &mut governor, symbol, &bar, &signal_bar.signal());
            last = Some(bar);
            processed += 1;
        }

        if let Some(bar) = last {
            if let Some(trade) = ledger.finish(bar.timestamp, bar.close) {
                book(&mut governor, symbol, &trade, bar.timestamp);
            }
        }

        let summary = self.aggregator.summarize(
            ledger.trades(),
            ledger.equity_curve(),
            ledger.initial_capital(),
            ledger.capital(),
        );
        tracing::info!(
            symbol,
            bars = processed,
            trades = summary.total_trades,
            pnl = %summary.total_pnl,
            "Backtest complete"
        );

        Ok(BacktestResult {
            summary,
            trades: ledger.trades().to_vec(),
            equity: ledger.equity_curve().to_vec(),
        })
    }
}

/// One bar: equity sample, exits, trailing ratchet, then the signal
fn step(
    ledger: &mut PositionLedger,
    governor: &mut RiskGovernor,
    symbol: &str,
    bar: &PriceBar,
    signal: &Signal,
) {
    let now = bar.timestamp;
    let point = ledger.record_equity(now);
    telemetry::set_gauge(GaugeMetric::Equity, symbol, point.equity);

    if let Some(trade) = ledger.check_exits(now, bar.high, bar.low) {
        book(governor, symbol, &trade, now);
    }

    if let Some(position) = ledger.position() {
        if let Some(stop) = governor.trailing_stop(position, bar.close) {
            if ledger.tighten_stop(now, stop) {
                governor.update_stop(symbol, stop);
            }
        }
    }

    let Some(requested) = signal.kind.side() else {
        return;
    };

    if let Some(position) = ledger.position() {
        // Reversal closes; the opposite entry waits for the next bar.
        if requested != position.side && governor.validate_signal(signal).is_ok() {
            if let Some(trade) = ledger.close(now, bar.close, CloseReason::Signal) {
                book(governor, symbol, &trade, now);
            }
        }
        return;
    }

    let side = match governor.validate_trade(signal, now) {
        Ok(side) => side,
        Err(rejection) => {
            tracing::debug!(symbol, %now, reason = %rejection, "Entry rejected");
            telemetry::record_rejection(symbol, rejection.kind());
            return;
        }
    };

    let request = OpenRequest {
        timestamp: now,
        price: bar.close,
        side,
        stop_loss: governor.stop_loss_price(bar.close, side),
        take_profit: governor.take_profit_price(bar.close, side),
        signal: signal.meta.clone(),
    };
    match ledger.open(request) {
        Ok(position) => governor.register_open(symbol, position),
        Err(rejection) => {
            tracing::debug!(symbol, %now, reason = %rejection, "Entry skipped");
            telemetry::record_rejection(symbol, "sizing");
        }
    }
}

fn book(governor: &mut RiskGovernor, symbol: &str, trade: &Trade, now: DateTime<Utc>) {
    governor.on_trade_closed(symbol, trade, now);
    telemetry::record_trade_closed(symbol, trade.close_reason);
    telemetry::set_gauge(GaugeMetric::DailyPnl, symbol, governor.state().daily_pnl);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{EventLog, LedgerEvent};
    use crate::signal::{Side, SignalKind};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn bar(
        minute: i64,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        kind: SignalKind,
    ) -> SignalBar {
        SignalBar::new(
            PriceBar {
                timestamp: t(minute),
                open: None,
                high,
                low,
                close,
                volume: None,
            },
            Signal::new(kind, dec!(0.9)),
        )
    }

    fn config() -> Config {
        let mut config = Config::with_capital(dec!(100));
        config.risk.max_open_positions = 1;
        config
    }

    #[test]
    fn test_take_profit_round_trip() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
            bar(5, dec!(105), dec!(99), dec!(104.5), SignalKind::Hold),
        ];
        let result = sim.run("SOLUSDT", bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].close_reason, CloseReason::TakeProfit);
        assert_eq!(result.trades[0].side, Side::Long);
        assert!(result.trades[0].pnl > dec!(0));
        assert_eq!(result.equity.len(), 2);
        assert_eq!(result.summary.take_profit_exits, 1);
    }

    #[test]
    fn test_reversal_closes_without_reopening() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
            bar(5, dec!(101), dec!(99.5), dec!(100.5), SignalKind::Sell),
            bar(10, dec!(101), dec!(100), dec!(100.5), SignalKind::Hold),
        ];
        let result = sim.run("SOLUSDT", bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].close_reason, CloseReason::Signal);
        assert_eq!(result.summary.end_of_data_exits, 0);
    }

    #[test]
    fn test_end_of_data_close() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Sell),
            bar(5, dec!(100.5), dec!(99.5), dec!(99.8), SignalKind::Hold),
        ];
        let result = sim.run("SOLUSDT", bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].close_reason, CloseReason::EndOfData);
        assert_eq!(result.trades[0].exit_time, t(5));
    }

    #[test]
    fn test_cooldown_blocks_reentry() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
            // stop at 98 is hit
            bar(1, dec!(100), dec!(97), dec!(97.5), SignalKind::Buy),
            // 5 minutes after the loss, still inside the 600s cooldown
            bar(6, dec!(98), dec!(97), dec!(97.5), SignalKind::Buy),
            bar(12, dec!(98), dec!(97), dec!(97.5), SignalKind::Hold),
        ];
        let result = sim.run("SOLUSDT", bars).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].close_reason, CloseReason::StopLoss);
        assert!(result.trades[0].pnl < dec!(0));
    }

    #[test]
    fn test_trailing_stop_locks_profit() {
        let mut cfg = config();
        cfg.risk.trailing_stop.enabled = true;
        cfg.risk.trailing_stop.pct = dec!(1);
        cfg.risk.take_profit_pct = dec!(50);
        let sim = BacktestSimulator::new(cfg).unwrap();

        let log = EventLog::new();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
            bar(5, dec!(103), dec!(100), dec!(103), SignalKind::Hold),
            bar(10, dec!(103), dec!(101), dec!(101.5), SignalKind::Hold),
        ];
        let result = sim
            .run_with_sinks("SOLUSDT", bars, vec![Box::new(log.clone())])
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].close_reason, CloseReason::StopLoss);
        assert!(result.trades[0].pnl > dec!(0));
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, LedgerEvent::StopMoved { .. })));
    }

    #[test]
    fn test_capital_reconciles() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let bars = vec![
            bar(0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
            bar(5, dec!(102), dec!(99), dec!(101), SignalKind::Sell),
            bar(20, dec!(101), dec!(100), dec!(100.2), SignalKind::Sell),
            bar(25, dec!(101), dec!(98), dec!(98.4), SignalKind::Buy),
            bar(40, dec!(99), dec!(98), dec!(98.5), SignalKind::Buy),
        ];
        let result = sim.run("SOLUSDT", bars).unwrap();
        let pnl: Decimal = result.trades.iter().map(|t| t.pnl).sum();
        assert_eq!(result.summary.final_capital, result.summary.initial_capital + pnl);
    }

    #[test]
    fn test_empty_series() {
        let sim = BacktestSimulator::new(config()).unwrap();
        let result = sim.run("SOLUSDT", vec![]).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity.is_empty());
        assert_eq!(result.summary.final_capital, dec!(100));
    }
}
