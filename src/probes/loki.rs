//! Loki probe: push one log line, retrying a fixed number of times with a
//! fixed delay between attempts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::{Probe, ProbeDetail, ServiceKind};
use crate::config::LokiConfig;
use crate::errors::{Error, Result};

pub const LOG_LINE: &str = "This is a new test log sent to Loki";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LokiProbe {
    config: LokiConfig,
    client: reqwest::Client,
}

impl LokiProbe {
    pub fn new(config: LokiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::request(e, "Failed to build HTTP client"))?;
        Ok(Self { config, client })
    }

    /// Push API body carrying a single line stamped with `now` in nanoseconds
    pub fn push_payload(now: DateTime<Utc>) -> Value {
        json!({
            "streams": [{
                "stream": { "service": "test-service", "env": "dev" },
                "values": [[format!("{}000000", now.timestamp_millis()), LOG_LINE]]
            }]
        })
    }

    async fn push(&self, url: &str, payload: &Value) -> Result<reqwest::StatusCode> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::request(e, format!("Failed to reach Loki at {}", url)))?;

        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(Error::http(format!("Loki rejected the push at {}", url), status.as_u16()))
        }
    }
}

#[async_trait]
impl Probe for LokiProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Loki
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let url = self.config.push_url();
        let payload = Self::push_payload(Utc::now());
        let max_retries = self.config.max_retries.max(1);
        let delay = self.config.retry_delay();

        let mut attempt = 1;
        loop {
            match self.push(&url, &payload).await {
                Ok(status) => {
                    info!(url = %url, attempt, status = status.as_u16(), "Log sent to Loki");
                    let detail = ProbeDetail::new(format!(
                        "pushed 1 line ({}) on attempt {}/{}",
                        status, attempt, max_retries
                    ))
                    .with_data(json!({ "url": url, "attempts": attempt, "status": status.as_u16() }));
                    return Ok(detail);
                }
                Err(e) if attempt < max_retries => {
                    warn!(attempt, error = %e, "Attempt {} failed to send log to Loki", attempt);
                    info!("Retrying in {:.1}s...", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Attempt {} failed to send log to Loki", attempt);
                    error!(attempts = max_retries, "All attempts failed. Check if Loki is running!");
                    return Err(e);
                }
            }
        }
    }
}
