//! Position lifecycle through the public API

use chrono::{DateTime, Duration, TimeZone, Utc};
use leverage_guard::config::{Config, IntrabarPolicy};
use leverage_guard::ledger::{
    CloseReason, EventLog, LedgerEvent, OpenRejection, OpenRequest, PositionLedger,
};
use leverage_guard::risk::{
    create_sizer, PositionSizer, Rejection, RiskGovernor, SizeDecision, SizingRequest,
};
use leverage_guard::signal::{Side, Signal, SignalKind, SignalMeta};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn config() -> Config {
    let mut config = Config::with_capital(dec!(100));
    config.risk.max_open_positions = 1;
    config
}

fn long_at(price: Decimal, at: DateTime<Utc>) -> OpenRequest {
    OpenRequest {
        timestamp: at,
        price,
        side: Side::Long,
        stop_loss: price * dec!(0.98),
        take_profit: price * dec!(1.04),
        signal: SignalMeta::new(),
    }
}

#[test]
fn test_sizer_respects_leverage_cap() {
    let sizer = create_sizer(&config());
    // A 0.01% stop asks for far more than 5x leverage allows.
    let decision = sizer.calculate(&SizingRequest {
        capital: dec!(100),
        side: Side::Long,
        entry_price: dec!(100),
        stop_price: dec!(99.99),
    });
    let SizeDecision::Sized { size, notional, clamped } = decision else {
        panic!("expected a size");
    };
    assert!(clamped);
    assert!(size * dec!(100) <= dec!(500));
    assert!(notional <= dec!(500));
}

#[test]
fn test_scenario_take_profit() {
    let mut ledger = PositionLedger::new(&config()).unwrap();
    ledger.record_equity(t(0));
    let position = ledger.open(long_at(dec!(100), t(0))).unwrap().clone();
    assert_eq!(position.entry_price, dec!(100.01));

    ledger.record_equity(t(1));
    let trade = ledger.check_exits(t(1), dec!(105), dec!(99.5)).unwrap();
    assert_eq!(trade.close_reason, CloseReason::TakeProfit);
    assert!(trade.exit_price > dec!(103.98) && trade.exit_price < dec!(104));
    assert!(trade.pnl > Decimal::ZERO);
    assert_eq!(ledger.capital(), dec!(100) + trade.pnl);
}

#[test]
fn test_stop_wins_ties_unless_configured() {
    let mut stop_first = PositionLedger::new(&config()).unwrap();
    stop_first.open(long_at(dec!(100), t(0))).unwrap();
    let trade = stop_first.check_exits(t(1), dec!(110), dec!(90)).unwrap();
    assert_eq!(trade.close_reason, CloseReason::StopLoss);

    let mut cfg = config();
    cfg.execution.intrabar_policy = IntrabarPolicy::TargetFirst;
    let mut target_first = PositionLedger::new(&cfg).unwrap();
    target_first.open(long_at(dec!(100), t(0))).unwrap();
    let trade = target_first.check_exits(t(1), dec!(110), dec!(90)).unwrap();
    assert_eq!(trade.close_reason, CloseReason::TakeProfit);
}

#[test]
fn test_scenario_cooldown() {
    let mut ledger = PositionLedger::new(&config()).unwrap();
    let mut governor = RiskGovernor::new(&config()).unwrap();
    let buy = Signal::new(SignalKind::Buy, dec!(0.75));

    assert_eq!(governor.validate_trade(&buy, t(0)), Ok(Side::Long));
    let position = ledger.open(long_at(dec!(100), t(0))).unwrap().clone();
    governor.register_open("SOLUSDT", &position);

    let loss = ledger.check_exits(t(2), dec!(100), dec!(97)).unwrap();
    governor.on_trade_closed("SOLUSDT", &loss, t(2));

    assert!(matches!(
        governor.validate_trade(&buy, t(7)),
        Err(Rejection::Cooldown { remaining_secs: 300 })
    ));
    assert_eq!(governor.validate_trade(&buy, t(12)), Ok(Side::Long));
}

#[test]
fn test_scenario_second_open_rejected() {
    let mut ledger = PositionLedger::new(&config()).unwrap();
    let log = EventLog::new();
    ledger.add_sink(Box::new(log.clone()));

    ledger.open(long_at(dec!(100), t(0))).unwrap();
    let before = ledger.state().clone();
    assert_eq!(ledger.open(long_at(dec!(101), t(1))).unwrap_err(), OpenRejection::AlreadyOpen);
    assert_eq!(ledger.state(), &before);
    assert_eq!(log.len(), 1);
}

#[test]
fn test_scenario_end_of_data() {
    let mut ledger = PositionLedger::new(&config()).unwrap();
    let log = EventLog::new();
    ledger.add_sink(Box::new(log.clone()));

    ledger.open(long_at(dec!(100), t(0))).unwrap();
    let trade = ledger.finish(t(60), dec!(100.5)).unwrap();
    assert_eq!(trade.close_reason, CloseReason::EndOfData);
    assert_eq!(trade.duration_secs, 3600);
    assert_eq!(ledger.trades().len(), 1);
    assert!(matches!(log.events().last(), Some(LedgerEvent::Closed(_))));
}
