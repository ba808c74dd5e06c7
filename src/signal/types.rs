//! Signal types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque key-value metadata carried from a signal onto its position and trade
pub type SignalMeta = BTreeMap<String, serde_json::Value>;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Profits when price rises
    Long,
    /// Profits when price falls
    Short,
}

impl Side {
    /// Direction multiplier applied to price differences
    pub fn sign(self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// The opposite side
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl SignalKind {
    /// Side this signal asks for, `None` for HOLD
    pub fn side(self) -> Option<Side> {
        match self {
            SignalKind::Buy => Some(Side::Long),
            SignalKind::Sell => Some(Side::Short),
            SignalKind::Hold => None,
        }
    }
}

/// A directional signal with its confidence in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Requested direction
    pub kind: SignalKind,
    /// Classifier confidence
    pub confidence: Decimal,
    /// Free-form metadata (model name, probabilities, ...)
    #[serde(default)]
    pub meta: SignalMeta,
}

impl Signal {
    /// Create a signal without metadata
    pub fn new(kind: SignalKind, confidence: Decimal) -> Self {
        Self {
            kind,
            confidence,
            meta: SignalMeta::new(),
        }
    }

    /// A HOLD signal
    pub fn hold() -> Self {
        Self::new(SignalKind::Hold, Decimal::ZERO)
    }

    /// Attach a metadata entry
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Long.sign(), dec!(1));
        assert_eq!(Side::Short.sign(), dec!(-1));
        assert_eq!(Side::Long.opposite(), Side::Short);
    }

    #[test]
    fn test_signal_kind_side() {
        assert_eq!(SignalKind::Buy.side(), Some(Side::Long));
        assert_eq!(SignalKind::Sell.side(), Some(Side::Short));
        assert_eq!(SignalKind::Hold.side(), None);
    }

    #[test]
    fn test_signal_deserialize() {
        let json = r#"{"kind":"BUY","confidence":0.72,"meta":{"model":"xgb"}}"#;
        let signal: Signal = serde_json::from_str(json).unwrap();
        assert_eq!(signal.kind, SignalKind::Buy);
        assert_eq!(signal.confidence, dec!(0.72));
        assert_eq!(signal.meta["model"], "xgb");
    }

    #[test]
    fn test_signal_meta_defaults_empty() {
        let signal: Signal = serde_json::from_str(r#"{"kind":"HOLD","confidence":0}"#).unwrap();
        assert!(signal.meta.is_empty());
    }

    #[test]
    fn test_with_meta() {
        let signal = Signal::new(SignalKind::Sell, dec!(0.9)).with_meta("prob_down", 0.9);
        assert_eq!(signal.meta.len(), 1);
    }
}
