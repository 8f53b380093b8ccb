//! # Record Delivery
//!
//! The network boundary the sync coordinator drains into. [`HttpDelivery`]
//! posts each record's payload as JSON to the sync endpoint; only a 2xx
//! status counts as delivered.

use crate::client::config::Config;
use crate::shared::error::DeliveryError;
use crate::shared::record::PendingRecord;
use async_trait::async_trait;
use std::time::Duration;

/// Sends one record to the server
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, record: &PendingRecord) -> Result<(), DeliveryError>;
}

/// `POST <sync-endpoint>` with the payload as the JSON body
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: reqwest::Client,
    url: String,
}

impl HttpDelivery {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Delivery to the configured sync endpoint
    pub fn from_config(config: &Config) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, config.sync_url()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, record: &PendingRecord) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.url)
            .header("Idempotency-Key", &record.key)
            .json(&record.payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
