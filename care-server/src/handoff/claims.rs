//! External claims processor

use super::error::{HandoffError, HandoffResult};
use async_trait::async_trait;
use reqwest::Client;
use shared::order::Order;
use std::time::Duration;

#[async_trait]
pub trait ClaimsProcessor: Send + Sync {
    /// Hand a submitted claim to the processor
    ///
    /// Every failure is reported as [`HandoffError::Transient`]; the caller
    /// retries.
    async fn submit(&self, order: &Order) -> HandoffResult<()>;
}

/// Posts the claim as JSON to a configured URL
#[derive(Debug, Clone)]
pub struct HttpClaimsProcessor {
    client: Client,
    url: String,
}

impl HttpClaimsProcessor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> HandoffResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HandoffError::Transient(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ClaimsProcessor for HttpClaimsProcessor {
    async fn submit(&self, order: &Order) -> HandoffResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(order)
            .send()
            .await
            .map_err(|e| HandoffError::Transient(format!("claims processor unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandoffError::Transient(format!(
                "claims processor answered {}",
                status
            )));
        }
        tracing::info!(order_id = %order.id, "Claim submitted to processor");
        Ok(())
    }
}

/// Used when no processor URL is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClaimsProcessor;

#[async_trait]
impl ClaimsProcessor for NoopClaimsProcessor {
    async fn submit(&self, order: &Order) -> HandoffResult<()> {
        tracing::info!(order_id = %order.id, "No claims processor configured, submission skipped");
        Ok(())
    }
}
