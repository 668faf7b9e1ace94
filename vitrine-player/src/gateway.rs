//! Remote fetch gateway
//!
//! Fetches the raw model directory payload for a model set. A single request
//! goes to the primary endpoint; if it fails for any reason (status, network,
//! timeout, unreadable body) one more request goes to the fallback endpoint
//! with its own timeout budget. There is no further retry.

use crate::error::FetchError;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vitrine_common::config::GatewayConfig;

const USER_AGENT: &str = concat!("vitrine/", env!("CARGO_PKG_VERSION"));

/// Request body sent to both endpoints
#[derive(Debug, Serialize)]
struct DirectoryRequest<'a> {
    id: &'a str,
}

/// HTTP client for the directory source
pub struct FetchGateway {
    http_client: reqwest::Client,
    primary_endpoint: String,
    fallback_endpoint: String,
    timeout: Duration,
}

impl FetchGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, FetchError> {
        Self::with_endpoints(
            &config.primary_endpoint,
            &config.fallback_endpoint,
            config.timeout(),
        )
    }

    pub fn with_endpoints(
        primary_endpoint: &str,
        fallback_endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            primary_endpoint: primary_endpoint.to_string(),
            fallback_endpoint: fallback_endpoint.to_string(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the directory payload for `model_id`
    ///
    /// Cancelling `cancel` aborts the in-flight attempt and skips the
    /// fallback.
    pub async fn fetch(
        &self,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        info!(model_id = %model_id, "Fetching model directory");

        match self.try_endpoint(&self.primary_endpoint, model_id, cancel).await {
            Ok(payload) => Ok(payload),
            Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
            Err(primary_err) => {
                warn!(
                    "Primary endpoint failed: {}. Trying fallback endpoint...",
                    primary_err
                );
                match self.try_endpoint(&self.fallback_endpoint, model_id, cancel).await {
                    Ok(payload) => Ok(payload),
                    Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
                    Err(last) => Err(FetchError::BothEndpointsFailed(Box::new(last))),
                }
            }
        }
    }

    /// One POST attempt bounded by the gateway timeout
    async fn try_endpoint(
        &self,
        endpoint: &str,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, FetchError> {
        let request = async {
            let response = self
                .http_client
                .post(endpoint)
                .json(&DirectoryRequest { id: model_id })
                .send()
                .await
                .map_err(|e| FetchError::Network {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;

            let status = response.status();
            debug!(endpoint = %endpoint, status = %status, "Directory response received");

            if !status.is_success() {
                return Err(FetchError::Status {
                    endpoint: endpoint.to_string(),
                    status: status.as_u16(),
                });
            }

            response.json::<Value>().await.map_err(|e| FetchError::InvalidBody {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
        };

        // Armed before the request starts, dropped with the select once
        // either side completes
        let deadline = tokio::time::sleep(self.timeout);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = request => result,
            _ = deadline => {
                error!(
                    "Fetch request to {} timed out after {}ms",
                    endpoint,
                    self.timeout.as_millis()
                );
                Err(FetchError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}
