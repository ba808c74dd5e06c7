//! Bounded retries around any gateway

use std::time::Duration;

use async_trait::async_trait;

use super::{Fill, GatewayError, OrderGateway, OrderRequest};
use crate::config::ExecutionConfig;
use crate::telemetry;

/// Retries failed submissions a fixed number of times with a fixed delay,
/// then surfaces the last error
pub struct RetryingGateway<G> {
    inner: G,
    max_attempts: u32,
    delay: Duration,
}

impl<G: OrderGateway> RetryingGateway<G> {
    pub fn new(inner: G, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(inner: G, config: &ExecutionConfig) -> Self {
        Self::new(inner, config.max_retries, Duration::from_millis(config.retry_delay_ms))
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: OrderGateway> OrderGateway for RetryingGateway<G> {
    async fn submit_market(&self, order: OrderRequest) -> Result<Fill, GatewayError> {
        let mut attempt = 1;
        loop {
            match self.inner.submit_market(order.clone()).await {
                Ok(fill) => return Ok(fill),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(
                        symbol = %order.symbol,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Order failed, retrying"
                    );
                    telemetry::record_gateway_retry();
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        symbol = %order.symbol,
                        attempts = attempt,
                        error = %e,
                        "Order failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperGateway;
    use crate::signal::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        paper: PaperGateway,
    }

    #[async_trait]
    impl OrderGateway for Flaky {
        async fn submit_market(&self, order: OrderRequest) -> Result<Fill, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(GatewayError::Unavailable(format!("attempt {call}")));
            }
            self.paper.submit_market(order).await
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            paper: PaperGateway::new(),
        }
    }

    fn order() -> OrderRequest {
        OrderRequest {
            symbol: "ETHUSDT".to_string(),
            side: Side::Long,
            size: dec!(0.1),
            reference_price: dec!(3000),
            reduce_only: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let gateway = RetryingGateway::new(flaky(2), 3, Duration::from_millis(1));
        let fill = gateway.submit_market(order()).await.unwrap();
        assert_eq!(fill.avg_price, dec!(3000));
        assert_eq!(gateway.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_surfaces_last_error() {
        let gateway = RetryingGateway::new(flaky(5), 3, Duration::from_millis(1));
        let err = gateway.submit_market(order()).await.unwrap_err();
        assert_eq!(err, GatewayError::Unavailable("attempt 3".into()));
        assert_eq!(gateway.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let gateway = RetryingGateway::new(flaky(0), 0, Duration::from_millis(1));
        assert!(gateway.submit_market(order()).await.is_ok());
    }
}
