//! Configuration types for leverage-guard

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::LogFormat;

/// Configuration errors. Any of these makes the core unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A parameter is outside its allowed range
    #[error("Invalid config value for {field}: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Account capital and leverage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    pub initial_capital: Decimal,
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
}

/// Fill cost model and gateway behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Fraction of notional charged at entry and at exit (0.0006 = 0.06%)
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    /// Fractional price adjustment applied against every fill
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: Decimal,
    /// Gateway attempts per order before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between gateway attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Which threshold wins when a bar crosses both stop and target
    #[serde(default)]
    pub intrabar_policy: IntrabarPolicy,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Ordering of stop-loss and take-profit checks within one bar.
///
/// Bar extremes do not reveal which level was touched first. `StopFirst`
/// assumes the worst case.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    #[default]
    StopFirst,
    TargetFirst,
}

/// Risk limits and sizing parameters. Percentages are in percent units (2 = 2%).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
    #[serde(default = "default_risk_per_trade_pct")]
    pub risk_per_trade_pct: Decimal,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    #[serde(default = "default_max_loss_per_day_pct")]
    pub max_loss_per_day_pct: Decimal,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: Decimal,
    /// Trading halts once capital falls to this fraction of the initial capital
    #[serde(default = "default_drawdown_halt_fraction")]
    pub drawdown_halt_fraction: Decimal,
    #[serde(default)]
    pub sizing_mode: SizingMode,
    #[serde(default)]
    pub trailing_stop: TrailingStopConfig,
}

/// Sizing mode for position sizing
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizingMode {
    /// Size from the risk budget and stop distance
    #[default]
    Risk,
    /// Equal share of leveraged capital per open slot
    Fixed,
}

/// Trailing stop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrailingStopConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_trailing_pct")]
    pub pct: Decimal,
}

/// Performance report settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// Scale applied to the per-trade Sharpe ratio (sqrt of this value)
    #[serde(default = "default_annualization_factor")]
    pub annualization_factor: Decimal,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port, disabled when absent
    pub metrics_port: Option<u16>,
}

fn default_leverage() -> Decimal {
    dec!(5)
}
fn default_commission_rate() -> Decimal {
    dec!(0.0006)
}
fn default_slippage_rate() -> Decimal {
    dec!(0.0001)
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_risk_per_trade_pct() -> Decimal {
    dec!(2)
}
fn default_stop_loss_pct() -> Decimal {
    dec!(2)
}
fn default_take_profit_pct() -> Decimal {
    dec!(4)
}
fn default_max_loss_per_day_pct() -> Decimal {
    dec!(10)
}
fn default_max_open_positions() -> usize {
    3
}
fn default_cooldown_seconds() -> u64 {
    600
}
fn default_confidence_threshold() -> Decimal {
    dec!(0.6)
}
fn default_drawdown_halt_fraction() -> Decimal {
    dec!(0.5)
}
fn default_trailing_pct() -> Decimal {
    dec!(1.5)
}
fn default_annualization_factor() -> Decimal {
    dec!(252)
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            commission_rate: default_commission_rate(),
            slippage_rate: default_slippage_rate(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            intrabar_policy: IntrabarPolicy::StopFirst,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: default_risk_per_trade_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_loss_per_day_pct: default_max_loss_per_day_pct(),
            max_open_positions: default_max_open_positions(),
            cooldown_seconds: default_cooldown_seconds(),
            confidence_threshold: default_confidence_threshold(),
            drawdown_halt_fraction: default_drawdown_halt_fraction(),
            sizing_mode: SizingMode::Risk,
            trailing_stop: TrailingStopConfig::default(),
        }
    }
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pct: default_trailing_pct(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            annualization_factor: default_annualization_factor(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with defaults for everything but the starting capital
    pub fn with_capital(initial_capital: Decimal) -> Self {
        Self {
            account: AccountConfig {
                initial_capital,
                leverage: default_leverage(),
            },
            execution: ExecutionConfig::default(),
            risk: RiskConfig::default(),
            analytics: AnalyticsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Check every risk parameter is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("account.initial_capital", self.account.initial_capital)?;
        positive("account.leverage", self.account.leverage)?;
        unit_interval("execution.commission_rate", self.execution.commission_rate)?;
        unit_interval("execution.slippage_rate", self.execution.slippage_rate)?;
        if self.execution.max_retries == 0 {
            return Err(out_of_range("execution.max_retries", "must be at least 1"));
        }

        let risk = &self.risk;
        percent("risk.risk_per_trade_pct", risk.risk_per_trade_pct)?;
        percent("risk.stop_loss_pct", risk.stop_loss_pct)?;
        percent("risk.take_profit_pct", risk.take_profit_pct)?;
        percent("risk.max_loss_per_day_pct", risk.max_loss_per_day_pct)?;
        if risk.max_open_positions == 0 {
            return Err(out_of_range("risk.max_open_positions", "must be at least 1"));
        }
        unit_interval("risk.confidence_threshold", risk.confidence_threshold)?;
        if risk.cooldown_seconds > MAX_COOLDOWN_SECONDS {
            return Err(out_of_range(
                "risk.cooldown_seconds",
                format!("{} exceeds {MAX_COOLDOWN_SECONDS}", risk.cooldown_seconds),
            ));
        }
        let halt = risk.drawdown_halt_fraction;
        if halt < Decimal::ZERO || halt >= Decimal::ONE {
            return Err(out_of_range(
                "risk.drawdown_halt_fraction",
                format!("{halt} not in [0, 1)"),
            ));
        }
        if risk.trailing_stop.enabled {
            percent("risk.trailing_stop.pct", risk.trailing_stop.pct)?;
        }

        positive("analytics.annualization_factor", self.analytics.annualization_factor)?;
        Ok(())
    }
}

/// Longest accepted post-loss cooldown (one year)
pub const MAX_COOLDOWN_SECONDS: u64 = 365 * 24 * 60 * 60;

fn out_of_range(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO {
        return Err(out_of_range(field, format!("{value} must be positive")));
    }
    Ok(())
}

fn percent(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO || value > dec!(100) {
        return Err(out_of_range(field, format!("{value} not in (0, 100]")));
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(out_of_range(field, format!("{value} not in [0, 1]")));
    }
    Ok(())
}
