//! glTF → USDZ conversion and its per-session cache
//!
//! The cache keeps one write-once slot per content key. Concurrent requests
//! for the same key share a single outbound conversion; a failed conversion
//! leaves the slot empty so a later request can try again.

use crate::error::ConversionError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Converts a renderable content reference into a platform asset reference
#[async_trait]
pub trait AssetConverter: Send + Sync {
    async fn convert(&self, content: &str) -> Result<String, ConversionError>;
}

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    #[serde(rename = "usdzUrl")]
    usdz_url: Option<String>,
}

/// Conversion service reached over HTTP: `GET <api>?url=<content>`
pub struct HttpAssetConverter {
    http_client: reqwest::Client,
    api_url: String,
}

impl HttpAssetConverter {
    pub fn new(api_url: &str) -> Result<Self, ConversionError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ConversionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.to_string(),
        })
    }
}

#[async_trait]
impl AssetConverter for HttpAssetConverter {
    async fn convert(&self, content: &str) -> Result<String, ConversionError> {
        let url = reqwest::Url::parse_with_params(&self.api_url, &[("url", content)])
            .map_err(|e| ConversionError::InvalidApiUrl(e.to_string()))?;

        debug!(url = %url, "Requesting asset conversion");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ConversionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::Api(status.as_u16()));
        }

        let body: ConversionResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::InvalidBody(e.to_string()))?;

        body.usdz_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConversionError::MissingAsset)
    }
}

/// Memoized, coalescing conversion cache
pub struct ConversionCache {
    converter: Arc<dyn AssetConverter>,
    slots: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ConversionCache {
    pub fn new(converter: Arc<dyn AssetConverter>) -> Self {
        Self {
            converter,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the converted asset for `key`, converting at most once
    ///
    /// While a conversion for `key` is in flight, other callers wait for it
    /// instead of issuing their own request.
    pub async fn get_or_convert(&self, key: &str) -> Result<String, ConversionError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        if let Some(asset) = slot.get() {
            debug!(key = %key, "Conversion cache hit");
            return Ok(asset.clone());
        }

        slot.get_or_try_init(|| async {
            info!(key = %key, "Converting asset");
            self.converter.convert(key).await.map_err(|e| {
                warn!(key = %key, "Asset conversion failed: {}", e);
                e
            })
        })
        .await
        .cloned()
    }

    /// Completed conversion for `key`, without triggering one
    pub async fn cached(&self, key: &str) -> Option<String> {
        let slots = self.slots.lock().await;
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    /// Number of completed conversions
    pub async fn len(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
