//! Redis probe: SET a key and read the same key back.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::json;
use tracing::info;

use super::{connect_within, Probe, ProbeDetail, ServiceKind};
use crate::config::settings::DEFAULT_CONNECT_TIMEOUT_SECONDS;
use crate::config::RedisConfig;
use crate::errors::{Error, Result};

pub const TEST_KEY: &str = "test";
pub const TEST_VALUE: &str = "value123";

pub struct RedisProbe {
    config: RedisConfig,
}

impl RedisProbe {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Probe for RedisProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Redis
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let url = self.config.url();
        let client = redis::Client::open(url.as_str())
            .map_err(|e| Error::redis(e, format!("Invalid Redis URL {}", url)))?;

        let mut conn = connect_within(
            "connect to Redis",
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            async {
                client.get_multiplexed_async_connection().await.map_err(|e| {
                    Error::redis(e, format!("Failed to connect to Redis at {}", url))
                })
            },
        )
        .await?;
        info!(url = %url, "Connected to Redis");

        conn.set::<_, _, ()>(TEST_KEY, TEST_VALUE)
            .await
            .map_err(|e| Error::redis(e, format!("SET {} failed", TEST_KEY)))?;

        let value: Option<String> = conn
            .get(TEST_KEY)
            .await
            .map_err(|e| Error::redis(e, format!("GET {} failed", TEST_KEY)))?;
        info!(key = TEST_KEY, value = ?value, "Redis Value");

        match value.as_deref() {
            Some(TEST_VALUE) => Ok(ProbeDetail::new(format!("{} = {}", TEST_KEY, TEST_VALUE))
                .with_data(json!({ "key": TEST_KEY, "value": TEST_VALUE }))),
            other => Err(Error::validation(format!(
                "Redis returned {:?} for key '{}', expected '{}'",
                other, TEST_KEY, TEST_VALUE
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = RedisProbe::new(RedisConfig { host: "127.0.0.1".to_string(), port });
        let err = probe.run().await.unwrap_err();
        assert!(matches!(err, Error::Redis { .. } | Error::Timeout { .. }));
    }
}
