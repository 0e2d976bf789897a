//! RabbitMQ probe: publish a message and try to consume it back.
//!
//! The consume step races a timer. If nothing arrives in time the probe still
//! passes with a warning, since another consumer on a shared queue can win
//! the delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{connect_within, Probe, ProbeDetail, ServiceKind};
use crate::config::settings::DEFAULT_CONNECT_TIMEOUT_SECONDS;
use crate::config::RabbitMqConfig;
use crate::errors::{Error, Result};

const CONSUMER_TAG: &str = "devprobe";
const REPLY_SUCCESS: u16 = 200;

pub const NO_MESSAGE_WARNING: &str =
    "No message consumed within timeout (another consumer may have taken it)";

pub struct RabbitMqProbe {
    config: RabbitMqConfig,
}

impl RabbitMqProbe {
    pub fn new(config: RabbitMqConfig) -> Self {
        Self { config }
    }

    /// Body published to the queue
    pub fn message_body() -> String {
        json!({ "text": "Hello RabbitMQ", "ts": Utc::now().to_rfc3339() }).to_string()
    }

    async fn exchange(&self, connection: &Connection) -> Result<ProbeDetail> {
        let queue = self.config.queue.as_str();
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::amqp(e, "Failed to open channel"))?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions { durable: false, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::amqp(e, format!("Failed to declare queue '{}'", queue)))?;

        let message = Self::message_body();
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                message.as_bytes(),
                BasicProperties::default(),
            )
            .await
            .map_err(|e| Error::amqp(e, format!("Failed to publish to '{}'", queue)))?
            .await
            .map_err(|e| Error::amqp(e, "Publish was not confirmed"))?;
        info!(queue, message = %message, "Message sent to queue");

        let received = self.consume_one(&channel).await?;

        channel
            .close(REPLY_SUCCESS, "devprobe done")
            .await
            .map_err(|e| Error::amqp(e, "Failed to close channel"))?;

        Ok(exchange_detail(queue, message, received))
    }

    /// Wait for one delivery, acknowledging it; `None` when the timer wins
    async fn consume_one(&self, channel: &Channel) -> Result<Option<String>> {
        let queue = self.config.queue.as_str();
        let mut consumer = channel
            .basic_consume(
                queue,
                CONSUMER_TAG,
                BasicConsumeOptions { no_ack: false, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::amqp(e, format!("Failed to consume from '{}'", queue)))?;

        match first_delivery(&mut consumer, self.config.consume_timeout()).await {
            FirstDelivery::Received(delivery) => {
                let delivery = delivery.map_err(|e| Error::amqp(e, "Delivery failed"))?;
                let content = String::from_utf8_lossy(&delivery.data).into_owned();
                info!(content = %content, "Message received from queue");
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(|e| Error::amqp(e, "Failed to ack message"))?;
                Ok(Some(content))
            }
            FirstDelivery::Cancelled => {
                warn!(queue, "Consumer was cancelled before a message arrived");
                Ok(None)
            }
            FirstDelivery::TimedOut => Ok(None),
        }
    }
}

/// How waiting on a delivery stream ended
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FirstDelivery<T> {
    Received(T),
    /// The stream ended before yielding anything
    Cancelled,
    TimedOut,
}

/// Race the first item of `deliveries` against `limit`
pub(crate) async fn first_delivery<S>(
    deliveries: &mut S,
    limit: Duration,
) -> FirstDelivery<S::Item>
where
    S: Stream + Unpin,
{
    match tokio::time::timeout(limit, deliveries.next()).await {
        Ok(Some(item)) => FirstDelivery::Received(item),
        Ok(None) => FirstDelivery::Cancelled,
        Err(_) => FirstDelivery::TimedOut,
    }
}

fn exchange_detail(queue: &str, sent: String, received: Option<String>) -> ProbeDetail {
    let detail = ProbeDetail::new(format!("published to '{}'", queue));
    match received {
        Some(content) => {
            detail.with_data(json!({ "queue": queue, "sent": sent, "received": content }))
        }
        None => {
            info!("No message consumed within timeout (this can happen in some race conditions).");
            detail.with_data(json!({ "queue": queue, "sent": sent })).with_warning(NO_MESSAGE_WARNING)
        }
    }
}

#[async_trait]
impl Probe for RabbitMqProbe {
    fn service(&self) -> ServiceKind {
        ServiceKind::Rabbitmq
    }

    async fn run(&self) -> Result<ProbeDetail> {
        let target = self.config.display_url();
        let url = self.config.amqp_url()?;

        let connection = connect_within(
            "connect to RabbitMQ",
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
            async {
                Connection::connect(&url, ConnectionProperties::default()).await.map_err(|e| {
                    Error::amqp(e, format!("Failed to connect to RabbitMQ at {}", target))
                })
            },
        )
        .await;

        let connection = match connection {
            Ok(connection) => connection,
            Err(e) => {
                info!("RabbitMQ test finished");
                return Err(e);
            }
        };
        info!(url = %target, "Connected to RabbitMQ");

        let result = self.exchange(&connection).await;

        if let Err(e) = connection.close(REPLY_SUCCESS, "devprobe done").await {
            debug!(error = %e, "Ignoring error while closing RabbitMQ connection");
        }
        info!("RabbitMQ test finished");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ProbeReport, ProbeStatus};
    use tracing_test::traced_test;

    #[test]
    fn test_message_body_shape() {
        let body: serde_json::Value = serde_json::from_str(&RabbitMqProbe::message_body()).unwrap();
        assert_eq!(body["text"], "Hello RabbitMQ");
        let ts = body["ts"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_silent_stream_times_out() {
        let mut deliveries = futures::stream::pending::<Result<String>>();
        let outcome = first_delivery(&mut deliveries, Duration::from_millis(20)).await;
        assert!(matches!(outcome, FirstDelivery::TimedOut));
    }

    #[tokio::test]
    async fn test_ready_stream_yields_first_item() {
        let mut deliveries = futures::stream::iter(vec!["first", "second"]);
        let outcome = first_delivery(&mut deliveries, Duration::from_secs(5)).await;
        assert_eq!(outcome, FirstDelivery::Received("first"));
    }

    #[tokio::test]
    async fn test_ended_stream_is_cancelled() {
        let mut deliveries = futures::stream::empty::<u8>();
        let outcome = first_delivery(&mut deliveries, Duration::from_secs(5)).await;
        assert_eq!(outcome, FirstDelivery::Cancelled);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_delivery_reports_warning() {
        let detail = exchange_detail("test-queue", "hello".to_string(), None);
        assert_eq!(detail.warning.as_deref(), Some(NO_MESSAGE_WARNING));
        assert!(detail.data.as_ref().unwrap().get("received").is_none());
        assert!(logs_contain("No message consumed within timeout"));

        let report = ProbeReport::from_outcome(
            ServiceKind::Rabbitmq,
            Duration::from_millis(5),
            Ok(detail),
        );
        assert_eq!(report.status, ProbeStatus::Warning);
        assert_eq!(report.warning.as_deref(), Some(NO_MESSAGE_WARNING));
    }

    #[test]
    fn test_received_delivery_has_no_warning() {
        let detail = exchange_detail("test-queue", "hello".to_string(), Some("hello".to_string()));
        assert!(detail.warning.is_none());
        let data = detail.data.unwrap();
        assert_eq!(data["sent"], data["received"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unreachable_broker_still_logs_finish() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = RabbitMqProbe::new(RabbitMqConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        });

        let err = probe.run().await.unwrap_err();
        assert!(matches!(err, Error::Amqp { .. } | Error::Timeout { .. }));
        assert!(logs_contain("RabbitMQ test finished"));
    }
}
