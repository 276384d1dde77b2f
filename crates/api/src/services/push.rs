//! Push gateway transport.
//!
//! Posts one message per alert to the configured gateway. The dispatcher
//! treats any failure here as non-fatal; the alert is already stored.

use async_trait::async_trait;
use domain::error::DeliveryError;
use domain::models::Alert;
use domain::services::PushService;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::config::PushConfig;

pub struct HttpPushService {
    client: Client,
    config: PushConfig,
}

/// Message body posted to the gateway.
#[derive(Debug, Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl HttpPushService {
    pub fn new(config: PushConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DeliveryError::PushFailed(format!("http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PushService for HttpPushService {
    async fn send(&self, device_token: &str, alert: &Alert) -> Result<(), DeliveryError> {
        let data = serde_json::to_value(alert)
            .map_err(|e| DeliveryError::PushFailed(format!("serialize alert: {}", e)))?;
        let title = alert.alert_type.to_string();
        let message = PushMessage {
            to: device_token,
            title: &title,
            body: &alert.message,
            data: Some(data),
        };

        let mut request = self.client.post(&self.config.url).json(&message);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::PushFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::PushFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
