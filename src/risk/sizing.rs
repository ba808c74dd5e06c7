//! Position sizing implementations
//!
//! Risk-based sizing is the default: the stop distance decides how many units
//! put exactly `risk_per_trade_pct` of capital at risk. Fixed sizing splits
//! leveraged capital evenly across the allowed open slots.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::config::{Config, SizingMode};
use crate::signal::Side;

/// Decimal places kept when a size has to be cut down to the leverage cap
const CLAMP_DP: u32 = 12;

/// Inputs for one sizing decision
#[derive(Debug, Clone, Copy)]
pub struct SizingRequest {
    /// Capital available to the slot
    pub capital: Decimal,
    /// Direction of the intended position
    pub side: Side,
    /// Expected fill price
    pub entry_price: Decimal,
    /// Protective stop price
    pub stop_price: Decimal,
}

/// Why no size could be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum SizingRejection {
    /// Stop is on the profit side of the entry (or equal to it)
    #[error("invalid stop placement")]
    InvalidStopPlacement,
    /// Entry price is zero or negative
    #[error("non-positive entry price")]
    NonPositivePrice,
    /// Nothing left to trade with
    #[error("no capital available")]
    NoCapital,
}

/// Outcome of a sizing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    /// A tradeable size
    Sized {
        size: Decimal,
        notional: Decimal,
        /// Whether the leverage cap cut the size down
        clamped: bool,
    },
    /// Skip this trade
    Rejected(SizingRejection),
}

impl SizeDecision {
    /// Size, or zero when rejected
    pub fn size(&self) -> Decimal {
        match self {
            SizeDecision::Sized { size, .. } => *size,
            SizeDecision::Rejected(_) => Decimal::ZERO,
        }
    }
}

/// Trait for position sizing implementations
pub trait PositionSizer: Send + Sync {
    /// Calculate position size in units of the traded asset
    fn calculate(&self, request: &SizingRequest) -> SizeDecision;

    /// Get the sizing mode name
    fn mode_name(&self) -> &'static str;
}

/// Risk-budget sizing bounded by leverage
#[derive(Debug, Clone)]
pub struct RiskBasedSizer {
    /// Percent of capital lost if the stop is hit (2 = 2%)
    pub risk_pct: Decimal,
    /// Maximum notional as a multiple of capital
    pub leverage: Decimal,
}

impl RiskBasedSizer {
    /// Create a new risk-based sizer
    pub fn new(risk_pct: Decimal, leverage: Decimal) -> Self {
        Self { risk_pct, leverage }
    }

    /// Create from the run configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.risk.risk_per_trade_pct, config.account.leverage)
    }
}

impl PositionSizer for RiskBasedSizer {
    fn calculate(&self, request: &SizingRequest) -> SizeDecision {
        if let Some(rejection) = precheck(request) {
            return SizeDecision::Rejected(rejection);
        }

        let risk_amount = request.capital * self.risk_pct / dec!(100);
        let price_risk = match request.side {
            Side::Long => request.entry_price - request.stop_price,
            Side::Short => request.stop_price - request.entry_price,
        };
        if price_risk <= Decimal::ZERO {
            tracing::debug!(
                entry = %request.entry_price,
                stop = %request.stop_price,
                side = %request.side,
                "Invalid stop placement"
            );
            return SizeDecision::Rejected(SizingRejection::InvalidStopPlacement);
        }

        clamp_to_leverage(
            risk_amount / price_risk,
            request.entry_price,
            request.capital * self.leverage,
        )
    }

    fn mode_name(&self) -> &'static str {
        "risk"
    }
}

/// Equal share of leveraged capital per slot, ignoring stop distance
#[derive(Debug, Clone)]
pub struct FixedFractionSizer {
    pub leverage: Decimal,
    pub slots: usize,
}

impl FixedFractionSizer {
    /// Create a new fixed-fraction sizer
    pub fn new(leverage: Decimal, slots: usize) -> Self {
        Self {
            leverage,
            slots: slots.max(1),
        }
    }
}

impl PositionSizer for FixedFractionSizer {
    fn calculate(&self, request: &SizingRequest) -> SizeDecision {
        if let Some(rejection) = precheck(request) {
            return SizeDecision::Rejected(rejection);
        }

        let notional = request.capital * self.leverage / Decimal::from(self.slots);
        clamp_to_leverage(
            notional / request.entry_price,
            request.entry_price,
            request.capital * self.leverage,
        )
    }

    fn mode_name(&self) -> &'static str {
        "fixed"
    }
}

fn precheck(request: &SizingRequest) -> Option<SizingRejection> {
    if request.entry_price <= Decimal::ZERO {
        return Some(SizingRejection::NonPositivePrice);
    }
    if request.capital <= Decimal::ZERO {
        return Some(SizingRejection::NoCapital);
    }
    None
}

/// Enforce `size * entry_price <= max_notional`
fn clamp_to_leverage(size: Decimal, entry_price: Decimal, max_notional: Decimal) -> SizeDecision {
    if size <= Decimal::ZERO {
        return SizeDecision::Rejected(SizingRejection::NoCapital);
    }
    if size * entry_price <= max_notional {
        return SizeDecision::Sized {
            size,
            notional: size * entry_price,
            clamped: false,
        };
    }

    // Truncating keeps the product at or under the cap.
    let size =
        (max_notional / entry_price).round_dp_with_strategy(CLAMP_DP, RoundingStrategy::ToZero);
    SizeDecision::Sized {
        size,
        notional: size * entry_price,
        clamped: true,
    }
}

/// Create a position sizer based on configuration
pub fn create_sizer(config: &Config) -> Box<dyn PositionSizer> {
    match config.risk.sizing_mode {
        SizingMode::Risk => Box::new(RiskBasedSizer::from_config(config)),
        SizingMode::Fixed => Box::new(FixedFractionSizer::new(
            config.account.leverage,
            config.risk.max_open_positions,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(capital: Decimal, side: Side, entry: Decimal, stop: Decimal) -> SizingRequest {
        SizingRequest {
            capital,
            side,
            entry_price: entry,
            stop_price: stop,
        }
    }

    #[test]
    fn test_risk_sizer_long() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        let decision = sizer.calculate(&request(dec!(100), Side::Long, dec!(100), dec!(98)));

        // risk 2 / price risk 2 = 1 unit, notional 100 under the 500 cap
        assert_eq!(
            decision,
            SizeDecision::Sized {
                size: dec!(1),
                notional: dec!(100),
                clamped: false
            }
        );
    }

    #[test]
    fn test_risk_sizer_short() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        let decision = sizer.calculate(&request(dec!(1000), Side::Short, dec!(50), dec!(52)));
        assert_eq!(decision.size(), dec!(10));
    }

    #[test]
    fn test_risk_identity_holds_when_unclamped() {
        let sizer = RiskBasedSizer::new(dec!(1.5), dec!(20));
        let cases = [
            (dec!(100), Side::Long, dec!(100.01), dec!(98)),
            (dec!(2500), Side::Long, dec!(43.17), dec!(41.9)),
            (dec!(777), Side::Short, dec!(3.3333), dec!(3.5)),
        ];
        for (capital, side, entry, stop) in cases {
            let size = sizer.calculate(&request(capital, side, entry, stop)).size();
            let at_risk = size * (entry - stop).abs();
            let budget = capital * dec!(1.5) / dec!(100);
            assert!((at_risk - budget).abs() < dec!(0.000000001), "{at_risk} vs {budget}");
        }
    }

    #[test]
    fn test_invalid_stop_long() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        let decision = sizer.calculate(&request(dec!(100), Side::Long, dec!(100), dec!(101)));
        assert_eq!(decision, SizeDecision::Rejected(SizingRejection::InvalidStopPlacement));
        assert_eq!(decision.size(), dec!(0));
    }

    #[test]
    fn test_invalid_stop_short_equal_to_entry() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        let decision = sizer.calculate(&request(dec!(100), Side::Short, dec!(100), dec!(100)));
        assert_eq!(decision, SizeDecision::Rejected(SizingRejection::InvalidStopPlacement));
    }

    #[test]
    fn test_leverage_clamp() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        // Tight stop: 2 / 0.01 = 200 units = 20000 notional, capped at 500
        let decision = sizer.calculate(&request(dec!(100), Side::Long, dec!(100), dec!(99.99)));
        match decision {
            SizeDecision::Sized {
                size,
                notional,
                clamped,
            } => {
                assert!(clamped);
                assert_eq!(size, dec!(5));
                assert_eq!(notional, dec!(500));
            }
            other => panic!("expected size, got {other:?}"),
        }
    }

    #[test]
    fn test_clamp_never_exceeds_cap_with_awkward_prices() {
        let sizer = RiskBasedSizer::new(dec!(50), dec!(3));
        for entry in [dec!(3), dec!(7.77), dec!(0.333), dec!(98765.4321)] {
            let capital = dec!(101.37);
            let stop = entry - entry / dec!(10000);
            let size = sizer.calculate(&request(capital, Side::Long, entry, stop)).size();
            assert!(size * entry <= capital * dec!(3));
            assert!(size > dec!(0));
        }
    }

    #[test]
    fn test_rejects_non_positive_price_and_capital() {
        let sizer = RiskBasedSizer::new(dec!(2), dec!(5));
        assert_eq!(
            sizer.calculate(&request(dec!(100), Side::Long, dec!(0), dec!(-1))),
            SizeDecision::Rejected(SizingRejection::NonPositivePrice)
        );
        assert_eq!(
            sizer.calculate(&request(dec!(0), Side::Long, dec!(10), dec!(9))),
            SizeDecision::Rejected(SizingRejection::NoCapital)
        );
    }

    #[test]
    fn test_fixed_sizer() {
        let sizer = FixedFractionSizer::new(dec!(5), 3);
        // 100 * 5 / 3 = 166.67 notional at price 50
        let size = sizer.calculate(&request(dec!(100), Side::Long, dec!(50), dec!(0))).size();
        assert!(size * dec!(50) <= dec!(500));
        assert!((size * dec!(50) - dec!(166.666666)).abs() < dec!(0.001));
    }

    #[test]
    fn test_create_sizer_by_mode() {
        let mut config = Config::with_capital(dec!(100));
        assert_eq!(create_sizer(&config).mode_name(), "risk");

        config.risk.sizing_mode = SizingMode::Fixed;
        assert_eq!(create_sizer(&config).mode_name(), "fixed");
    }
}
