//! Entry admission, daily loss tracking and the trailing-stop rule

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::Rejection;
use crate::config::{Config, ConfigError, RiskConfig};
use crate::ledger::{Position, Trade};
use crate::signal::{Side, Signal};

/// A slot currently holding a position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenSlot {
    /// Slot key, usually the symbol
    pub slot: String,
    pub position_id: u64,
    pub side: Side,
    pub entry_price: Decimal,
    pub size: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub opened_at: DateTime<Utc>,
}

/// Mutable governor state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskState {
    /// Realized pnl since the last daily reset
    pub daily_pnl: Decimal,
    /// Sum of absolute losses since the last daily reset
    pub daily_loss: Decimal,
    /// Positions opened since the last daily reset
    pub trades_today: u32,
    pub last_loss_time: Option<DateTime<Utc>>,
    /// At most `max_open_positions` entries
    pub open_positions: Vec<OpenSlot>,
    pub daily_reset_date: Option<NaiveDate>,
    /// Initial capital plus every reported trade pnl
    pub current_capital: Decimal,
}

/// Point-in-time view of the governor for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct RiskSnapshot {
    pub current_capital: Decimal,
    pub initial_capital: Decimal,
    pub daily_pnl: Decimal,
    pub daily_loss: Decimal,
    pub daily_loss_pct: Decimal,
    pub trades_today: u32,
    pub open_positions: usize,
    pub max_open_positions: usize,
    pub leverage: Decimal,
    pub can_trade: bool,
    pub block_reason: Option<String>,
}

/// Gatekeeper for new positions across all slots
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    limits: RiskConfig,
    initial_capital: Decimal,
    leverage: Decimal,
    state: RiskState,
}

impl RiskGovernor {
    /// Create a governor from a validated configuration
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            capital = %config.account.initial_capital,
            leverage = %config.account.leverage,
            risk_per_trade_pct = %config.risk.risk_per_trade_pct,
            max_loss_per_day_pct = %config.risk.max_loss_per_day_pct,
            "Risk governor initialized"
        );
        Ok(Self {
            limits: config.risk.clone(),
            initial_capital: config.account.initial_capital,
            leverage: config.account.leverage,
            state: RiskState {
                daily_pnl: Decimal::ZERO,
                daily_loss: Decimal::ZERO,
                trades_today: 0,
                last_loss_time: None,
                open_positions: vec![],
                daily_reset_date: None,
                current_capital: config.account.initial_capital,
            },
        })
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn limits(&self) -> &RiskConfig {
        &self.limits
    }

    /// Clear daily counters once the UTC calendar day moves past the last reset
    pub fn reset_daily(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        match self.state.daily_reset_date {
            Some(last) if today > last => {
                tracing::info!(
                    previous_daily_pnl = %self.state.daily_pnl,
                    %today,
                    "Resetting daily tracking"
                );
                self.state.daily_pnl = Decimal::ZERO;
                self.state.daily_loss = Decimal::ZERO;
                self.state.trades_today = 0;
                self.state.daily_reset_date = Some(today);
            }
            Some(_) => {}
            None => self.state.daily_reset_date = Some(today),
        }
    }

    /// Whether a new position may be opened at `now`
    pub fn can_open(&mut self, now: DateTime<Utc>) -> Result<(), Rejection> {
        self.reset_daily(now);

        if self.state.open_positions.len() >= self.limits.max_open_positions {
            return Err(Rejection::MaxPositionsReached {
                max: self.limits.max_open_positions,
            });
        }

        let loss_pct = self.daily_loss_pct();
        if loss_pct >= self.limits.max_loss_per_day_pct {
            return Err(Rejection::DailyLossLimit { loss_pct });
        }

        if let Some(last_loss) = self.state.last_loss_time {
            let cooldown = Duration::seconds(self.limits.cooldown_seconds as i64);
            let elapsed = now - last_loss;
            if elapsed < cooldown {
                return Err(Rejection::Cooldown {
                    remaining_secs: (cooldown - elapsed).num_seconds(),
                });
            }
        }

        let floor = self.initial_capital * self.limits.drawdown_halt_fraction;
        if self.state.current_capital <= floor {
            return Err(Rejection::DrawdownHalt { floor });
        }

        Ok(())
    }

    /// Side requested by an actionable signal
    pub fn validate_signal(&self, signal: &Signal) -> Result<Side, Rejection> {
        let side = signal.kind.side().ok_or(Rejection::NotDirectional(signal.kind))?;
        if signal.confidence < self.limits.confidence_threshold {
            return Err(Rejection::LowConfidence {
                confidence: signal.confidence,
                threshold: self.limits.confidence_threshold,
            });
        }
        Ok(side)
    }

    /// Admission followed by signal validation
    pub fn validate_trade(
        &mut self,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> Result<Side, Rejection> {
        self.can_open(now)?;
        self.validate_signal(signal)
    }

    /// Track a position the ledger for `slot` just opened
    pub fn register_open(&mut self, slot: &str, position: &Position) {
        self.state.open_positions.retain(|s| s.slot != slot);
        self.state.open_positions.push(OpenSlot {
            slot: slot.to_string(),
            position_id: position.id,
            side: position.side,
            entry_price: position.entry_price,
            size: position.size,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            opened_at: position.entry_time,
        });
        self.state.trades_today += 1;
    }

    /// Book a closed trade for `slot`
    pub fn on_trade_closed(&mut self, slot: &str, trade: &Trade, now: DateTime<Utc>) {
        self.reset_daily(now);
        self.state.open_positions.retain(|s| s.slot != slot);
        self.state.daily_pnl += trade.pnl;
        self.state.current_capital += trade.pnl;
        if trade.pnl < Decimal::ZERO {
            self.state.daily_loss += trade.pnl.abs();
            self.state.last_loss_time = Some(now);
        }
        tracing::debug!(
            slot,
            pnl = %trade.pnl,
            daily_pnl = %self.state.daily_pnl,
            "Trade booked"
        );
    }

    /// Overwrite the tracked capital, e.g. after reconciling with an exchange balance
    pub fn update_capital(&mut self, capital: Decimal) {
        self.state.current_capital = capital;
        tracing::info!(%capital, "Capital updated");
    }

    /// Keep the governor's copy of a slot's stop in sync after a ratchet
    pub fn update_stop(&mut self, slot: &str, stop_loss: Decimal) {
        if let Some(open) = self.state.open_positions.iter_mut().find(|s| s.slot == slot) {
            open.stop_loss = stop_loss;
        }
    }

    pub fn is_slot_open(&self, slot: &str) -> bool {
        self.state.open_positions.iter().any(|s| s.slot == slot)
    }

    /// Tighter stop for `position` at `price`, if the trailing rule calls for one
    pub fn trailing_stop(&self, position: &Position, price: Decimal) -> Option<Decimal> {
        let trailing = &self.limits.trailing_stop;
        if !trailing.enabled || position.unrealized_pct(price) <= trailing.pct {
            return None;
        }

        let offset = trailing.pct / dec!(100);
        match position.side {
            Side::Long => {
                let candidate = price * (Decimal::ONE - offset);
                (candidate > position.stop_loss).then_some(candidate)
            }
            Side::Short => {
                let candidate = price * (Decimal::ONE + offset);
                (candidate < position.stop_loss).then_some(candidate)
            }
        }
    }

    /// Stop price `stop_loss_pct` away from `entry` on the losing side
    pub fn stop_loss_price(&self, entry: Decimal, side: Side) -> Decimal {
        let offset = self.limits.stop_loss_pct / dec!(100);
        match side {
            Side::Long => entry * (Decimal::ONE - offset),
            Side::Short => entry * (Decimal::ONE + offset),
        }
    }

    /// Target price `take_profit_pct` away from `entry` on the winning side
    pub fn take_profit_price(&self, entry: Decimal, side: Side) -> Decimal {
        let offset = self.limits.take_profit_pct / dec!(100);
        match side {
            Side::Long => entry * (Decimal::ONE + offset),
            Side::Short => entry * (Decimal::ONE - offset),
        }
    }

    fn daily_loss_pct(&self) -> Decimal {
        self.state.daily_loss / self.initial_capital * dec!(100)
    }

    /// Current risk metrics; evaluates admission at `now`
    pub fn snapshot(&mut self, now: DateTime<Utc>) -> RiskSnapshot {
        let admission = self.can_open(now);
        RiskSnapshot {
            current_capital: self.state.current_capital,
            initial_capital: self.initial_capital,
            daily_pnl: self.state.daily_pnl,
            daily_loss: self.state.daily_loss,
            daily_loss_pct: self.daily_loss_pct(),
            trades_today: self.state.trades_today,
            open_positions: self.state.open_positions.len(),
            max_open_positions: self.limits.max_open_positions,
            leverage: self.leverage,
            can_trade: admission.is_ok(),
            block_reason: admission.err().map(|r| r.to_string()),
        }
    }
}
