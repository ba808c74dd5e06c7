//! Execution module
//!
//! Order submission through a venue gateway (paper or live)

mod paper;
mod retry;
mod types;

pub use paper::PaperGateway;
pub use retry::RetryingGateway;
pub use types::{Fill, GatewayError, OrderId, OrderRequest};

use async_trait::async_trait;

/// Trait for venue gateways
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a market order and wait for its fill
    async fn submit_market(&self, order: OrderRequest) -> Result<Fill, GatewayError>;
}

