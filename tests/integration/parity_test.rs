//! The backtest and the live driver run the same state machine

use chrono::{DateTime, Duration, TimeZone, Utc};
use leverage_guard::backtest::{BacktestSimulator, PriceBar, SignalBar};
use leverage_guard::config::Config;
use leverage_guard::execution::{PaperGateway, RetryingGateway};
use leverage_guard::live::LiveTrader;
use leverage_guard::signal::{Signal, SignalKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 12, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn series() -> Vec<SignalBar> {
    let rows: [(i64, Decimal, Decimal, Decimal, SignalKind); 10] = [
        (0, dec!(100), dec!(100), dec!(100), SignalKind::Buy),
        (15, dec!(101.5), dec!(99.6), dec!(101.2), SignalKind::Hold),
        (30, dec!(104.3), dec!(100.9), dec!(103.8), SignalKind::Hold),
        (45, dec!(104.0), dec!(102.5), dec!(103.0), SignalKind::Sell),
        (60, dec!(103.9), dec!(102.2), dec!(102.6), SignalKind::Hold),
        (75, dec!(105.4), dec!(102.4), dec!(105.1), SignalKind::Buy),
        (90, dec!(105.6), dec!(103.9), dec!(104.2), SignalKind::Buy),
        (120, dec!(104.5), dec!(100.1), dec!(100.6), SignalKind::Hold),
        (150, dec!(101.0), dec!(99.8), dec!(100.4), SignalKind::Sell),
        (180, dec!(100.9), dec!(99.7), dec!(100.0), SignalKind::Hold),
    ];
    rows.into_iter()
        .map(|(m, high, low, close, kind)| {
            SignalBar::new(
                PriceBar {
                    timestamp: t(m),
                    open: None,
                    high,
                    low,
                    close,
                    volume: None,
                },
                Signal::new(kind, dec!(0.8)),
            )
        })
        .collect()
}

fn config() -> Config {
    let mut config = Config::with_capital(dec!(1000));
    config.risk.max_open_positions = 1;
    config.risk.cooldown_seconds = 1800;
    config.risk.trailing_stop.enabled = true;
    config
}

#[tokio::test]
async fn test_live_matches_backtest() {
    let replay = BacktestSimulator::new(config()).unwrap().run("SOLUSDT", series()).unwrap();

    let execution = config().execution;
    let gateway = RetryingGateway::from_config(PaperGateway::from_config(&execution), &execution);
    let trader = LiveTrader::new(config(), gateway).unwrap();
    let bars = series();
    for bar in &bars {
        trader.on_tick("SOLUSDT", &bar.bar(), &bar.signal(), bar.timestamp).await;
    }
    let last = bars.last().unwrap();
    trader.finish("SOLUSDT", last.timestamp, last.close).await.unwrap();

    let live = trader.trades("SOLUSDT").await;
    assert!(!live.is_empty());
    assert_eq!(live.len(), replay.trades.len());
    for (a, b) in live.iter().zip(&replay.trades) {
        assert_eq!(a.close_reason, b.close_reason);
        assert_eq!(a.entry_price, b.entry_price);
        assert_eq!(a.exit_price, b.exit_price);
        assert_eq!(a.pnl, b.pnl);
    }

    let summary = trader.summary("SOLUSDT").await.unwrap();
    assert_eq!(summary.final_capital, replay.summary.final_capital);
    assert_eq!(trader.gateway().inner().fills().await.len(), live.len() * 2);
}
