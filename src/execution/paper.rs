//! Paper trading gateway

use super::{Fill, GatewayError, OrderGateway, OrderId, OrderRequest};
use crate::config::ExecutionConfig;
use crate::signal::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Simulated gateway that fills every order immediately in full, at the
/// reference price moved against the order by `slippage_rate`.
/// Commission is left to the ledger.
#[derive(Clone, Default)]
pub struct PaperGateway {
    slippage_rate: Decimal,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperGateway {
    /// Gateway filling at the exact reference price
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slippage(slippage_rate: Decimal) -> Self {
        Self {
            slippage_rate,
            ..Self::default()
        }
    }

    /// Gateway slipping fills the way the backtest does
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::with_slippage(config.slippage_rate)
    }

    /// All fills so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_market(&self, order: OrderRequest) -> Result<Fill, GatewayError> {
        if order.size <= Decimal::ZERO {
            return Err(GatewayError::Rejected(format!("non-positive size {}", order.size)));
        }
        if order.reference_price <= Decimal::ZERO {
            return Err(GatewayError::Rejected("missing reference price".into()));
        }

        let fill = Fill {
            order_id: OrderId::new_v4(),
            symbol: order.symbol,
            side: order.side,
            avg_price: match order.side {
                Side::Long => order.reference_price * (Decimal::ONE + self.slippage_rate),
                Side::Short => order.reference_price * (Decimal::ONE - self.slippage_rate),
            },
            size: order.size,
            timestamp: order.timestamp,
        };
        self.fills.write().await.push(fill.clone());

        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            side = %fill.side,
            size = %fill.size,
            price = %fill.avg_price,
            "Paper order filled"
        );
        Ok(fill)
    }
}
