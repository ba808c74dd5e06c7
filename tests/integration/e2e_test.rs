//! End-to-end integration tests

use std::io::Write;

use leverage_guard::backtest::{BacktestSimulator, BarStream};
use leverage_guard::config::{Config, ExecutionMode, IntrabarPolicy, SizingMode};
use leverage_guard::ledger::CloseReason;
use rust_decimal_macros::dec;

#[test]
fn test_config_example_loads() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example")).unwrap();

    assert_eq!(config.account.initial_capital, dec!(100));
    assert_eq!(config.account.leverage, dec!(5));
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.execution.intrabar_policy, IntrabarPolicy::StopFirst);
    assert_eq!(config.risk.sizing_mode, SizingMode::Risk);
    assert_eq!(config.risk.cooldown_seconds, 600);
    assert!(!config.risk.trailing_stop.enabled);
    assert_eq!(config.telemetry.metrics_port, None);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config = Config::from_toml("[account]\ninitial_capital = 250\n").unwrap();
    assert_eq!(config.account.leverage, dec!(5));
    assert_eq!(config.execution.commission_rate, dec!(0.0006));
    assert_eq!(config.risk.max_open_positions, 3);
    assert_eq!(config.analytics.annualization_factor, dec!(252));
}

#[test]
fn test_invalid_config_is_refused_everywhere() {
    let mut config = Config::with_capital(dec!(100));
    config.risk.confidence_threshold = dec!(1.5);
    assert!(BacktestSimulator::new(config).is_err());
}

#[test]
fn test_backtest_from_bar_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let lines = [
        r#"{"timestamp":"2024-04-01T00:00:00Z","high":"100","low":"100","close":"100","signal":"BUY","confidence":"0.8"}"#,
        r#"{"timestamp":"2024-04-01T00:15:00Z","high":"101.2","low":"99.4","close":"100.9","signal":"HOLD","confidence":"0.3"}"#,
        r#"{"timestamp":"2024-04-01T00:30:00Z","high":"104.5","low":"100.5","close":"104.1","signal":"HOLD","confidence":"0.3"}"#,
        r#"{"timestamp":"2024-04-01T00:45:00Z","high":"104.4","low":"103.0","close":"103.2","signal":"SELL","confidence":"0.9"}"#,
        r#"{"timestamp":"2024-04-01T01:00:00Z","high":"103.5","low":"102.1","close":"102.4","signal":"HOLD","confidence":"0.2"}"#,
    ];
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }

    let bars = BarStream::load(file.path()).unwrap();
    let simulator = BacktestSimulator::new(Config::with_capital(dec!(100))).unwrap();
    let result = simulator.run("SOLUSDT", bars).unwrap();

    // Long hits its 104 target on the third bar, the short opened on the
    // fourth is force-closed at the end.
    let reasons: Vec<_> = result.trades.iter().map(|t| t.close_reason).collect();
    assert_eq!(reasons, vec![CloseReason::TakeProfit, CloseReason::EndOfData]);
    assert_eq!(result.equity.len(), 5);
    assert_eq!(result.summary.total_trades, 2);
    assert_eq!(
        result.summary.final_capital,
        dec!(100) + result.trades.iter().map(|t| t.pnl).sum::<rust_decimal::Decimal>()
    );

    let json = serde_json::to_value(&result.summary).unwrap();
    assert_eq!(json["total_trades"], 2);
}
