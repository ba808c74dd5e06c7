//! Prometheus metrics

use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::ledger::CloseReason;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Realized capital of a slot's ledger
    Equity,
    /// Realized P&L since the last daily reset
    DailyPnl,
    /// Governor capital (initial plus every booked trade)
    GovernorCapital,
    /// Open position count across slots
    OpenPositions,
    /// Stop of a slot's open position
    StopLoss,
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "leverage_guard_equity",
            GaugeMetric::DailyPnl => "leverage_guard_daily_pnl",
            GaugeMetric::GovernorCapital => "leverage_guard_governor_capital",
            GaugeMetric::OpenPositions => "leverage_guard_open_positions",
            GaugeMetric::StopLoss => "leverage_guard_stop_loss",
        }
    }
}

/// Set a gauge value, labelled with the slot it describes
pub fn set_gauge(metric: GaugeMetric, slot: &str, value: Decimal) {
    let value = value.to_f64().unwrap_or(f64::NAN);
    ::metrics::gauge!(metric.name(), "slot" => slot.to_string()).set(value);
}

/// Count a closed trade
pub fn record_trade_closed(slot: &str, reason: CloseReason) {
    ::metrics::counter!(
        "leverage_guard_trades_closed_total",
        "slot" => slot.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Count an entry the governor or sizer refused
pub fn record_rejection(slot: &str, kind: &'static str) {
    ::metrics::counter!(
        "leverage_guard_rejections_total",
        "slot" => slot.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Count a failed gateway attempt that will be retried
pub fn record_gateway_retry() {
    ::metrics::counter!("leverage_guard_gateway_retries_total").increment(1);
}

/// Record how long an order took to fill
pub fn record_order_latency(duration: Duration) {
    ::metrics::histogram!("leverage_guard_order_latency_ms")
        .record(duration.as_secs_f64() * 1000.0);
}
