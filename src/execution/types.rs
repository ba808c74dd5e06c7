//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::signal::Side;

/// Order identifier
pub type OrderId = Uuid;

/// A market order to be submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument, e.g. `SOLUSDT`
    pub symbol: String,
    /// Direction of the order itself (closing a long sells, i.e. `Short`)
    pub side: Side,
    /// Order size in base units
    pub size: Decimal,
    /// Last known price, used by simulated gateways
    pub reference_price: Decimal,
    /// Only reduce an existing position
    pub reduce_only: bool,
    pub timestamp: DateTime<Utc>,
}

/// A fill (executed order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Order ID
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    /// Volume-weighted fill price
    pub avg_price: Decimal,
    /// Filled size
    pub size: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
}

/// Gateway failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The venue refused the order
    #[error("order rejected: {0}")]
    Rejected(String),
    /// The venue could not be reached
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
    /// No answer within the venue's deadline
    #[error("order timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_serializes_side_uppercase() {
        let order = OrderRequest {
            symbol: "SOLUSDT".to_string(),
            side: Side::Short,
            size: dec!(1.5),
            reference_price: dec!(100),
            reduce_only: true,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["side"], "SHORT");
        assert_eq!(json["reduce_only"], true);
    }

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(
            GatewayError::Rejected("insufficient margin".into()).to_string(),
            "order rejected: insufficient margin"
        );
        assert_eq!(GatewayError::Timeout.to_string(), "order timed out");
    }
}
