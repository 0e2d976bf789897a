//! Webhook probe: POST one JSON event to the configured endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use url::Url;

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::WebhookConfig;
use crate::errors::{Error, Result};

pub const API_KEY_HEADER: &str = "X-Ultrahook-Api-Key";
pub const EVENT_NAME: &str = "test_event";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookProbe {
    url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WebhookProbe {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let url = config.target()?;

        // Self-signed certificates are accepted
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::request(e, "Failed to build HTTP client"))?;

        Ok(Self { url, api_key: config.api_key.clone(), client })
    }

    pub fn event_payload(now: DateTime<Utc>) -> Value {
        json!({
            "event": EVENT_NAME,
            "timestamp": now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "message": "This is a test webhook sent via Ultrahook",
        })
    }
}

#[async_trait]
impl Probe for WebhookProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Webhook
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let payload = Self::event_payload(Utc::now());

        let mut request = self.client.post(self.url.clone()).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            let err = Error::request(e, format!("Error sending webhook to {}", self.url));
            error!(error = %err, "Error sending webhook");
            if let Some(hint) = err.hint() {
                warn!("{}", hint);
            }
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), url = %self.url, "Webhook endpoint returned an error");
            return Err(Error::http(
                format!("Webhook endpoint {} rejected the event", self.url),
                status.as_u16(),
            ));
        }

        info!(url = %self.url, status = %status, "Webhook sent");

        Ok(ProbeDetail::new(format!("Response: {}", status))
            .with_data(json!({ "url": self.url.as_str(), "status": status.as_u16() })))
    }
}
