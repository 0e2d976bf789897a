//! # Service Probes
//!
//! One probe per infrastructure service. A probe opens its own connection,
//! performs a minimal write and read, logs what it saw and closes the
//! connection again. Probes share nothing but the [`Probe`] trait.

pub mod loki;
pub mod mail;
pub mod minio;
pub mod mongo;
pub mod postgres;
pub mod rabbitmq;
pub mod redis;
pub mod sqlite;
pub mod webhook;

pub use loki::LokiProbe;
pub use mail::MailProbe;
pub use minio::MinioProbe;
pub use mongo::MongoProbe;
pub use postgres::PostgresProbe;
pub use rabbitmq::RabbitMqProbe;
pub use redis::RedisProbe;
pub use sqlite::SqliteProbe;
pub use webhook::WebhookProbe;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::{Error, Result};

/// Infrastructure services devprobe knows how to smoke test
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Postgres,
    Sqlite,
    Mongo,
    Redis,
    Rabbitmq,
    Minio,
    Loki,
    Mail,
    Webhook,
}

impl ServiceKind {
    /// Every service, in the order `--all` runs them
    pub const ALL: [ServiceKind; 9] = [
        ServiceKind::Postgres,
        ServiceKind::Sqlite,
        ServiceKind::Mongo,
        ServiceKind::Redis,
        ServiceKind::Rabbitmq,
        ServiceKind::Mail,
        ServiceKind::Minio,
        ServiceKind::Loki,
        ServiceKind::Webhook,
    ];

    /// Services run when none are named on the command line
    pub const DEFAULT_SUITE: [ServiceKind; 5] = [
        ServiceKind::Postgres,
        ServiceKind::Mongo,
        ServiceKind::Redis,
        ServiceKind::Mail,
        ServiceKind::Minio,
    ];

    /// Name used in banners and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "PostgreSQL",
            ServiceKind::Sqlite => "SQLite",
            ServiceKind::Mongo => "MongoDB",
            ServiceKind::Redis => "Redis",
            ServiceKind::Rabbitmq => "RabbitMQ",
            ServiceKind::Minio => "MinIO",
            ServiceKind::Loki => "Loki",
            ServiceKind::Mail => "MailCatcher",
            ServiceKind::Webhook => "Webhook",
        }
    }

    /// Name accepted on the command line
    pub fn cli_name(&self) -> &'static str {
        match self {
            ServiceKind::Postgres => "postgres",
            ServiceKind::Sqlite => "sqlite",
            ServiceKind::Mongo => "mongo",
            ServiceKind::Redis => "redis",
            ServiceKind::Rabbitmq => "rabbitmq",
            ServiceKind::Minio => "minio",
            ServiceKind::Loki => "loki",
            ServiceKind::Mail => "mail",
            ServiceKind::Webhook => "webhook",
        }
    }

    /// Environment variables the probe reads
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::Postgres => &[
                "POSTGRES_HOST",
                "POSTGRES_PORT",
                "POSTGRES_USER",
                "POSTGRES_PASSWORD",
                "POSTGRES_DB",
                "POSTGRES_CONNECT_TIMEOUT_SECONDS",
            ],
            ServiceKind::Sqlite => &["SQLITE_DB_PATH"],
            ServiceKind::Mongo => &["MONGO_URI", "MONGO_DATABASE", "MONGO_COLLECTION"],
            ServiceKind::Redis => &["REDIS_HOST", "REDIS_PORT"],
            ServiceKind::Rabbitmq => &[
                "RABBITMQ_HOST",
                "RABBITMQ_PORT",
                "RABBITMQ_USER",
                "RABBITMQ_PASS",
                "RABBITMQ_QUEUE",
                "RABBITMQ_CONSUME_TIMEOUT_MS",
            ],
            ServiceKind::Minio => &[
                "MINIO_ENDPOINT",
                "MINIO_PORT",
                "MINIO_USE_SSL",
                "MINIO_ACCESS_KEY",
                "MINIO_SECRET_KEY",
                "MINIO_BUCKET",
                "MINIO_REGION",
            ],
            ServiceKind::Loki => {
                &["LOKI_HOST", "LOKI_PORT", "LOKI_MAX_RETRIES", "LOKI_RETRY_DELAY_MS"]
            }
            ServiceKind::Mail => &["MAIL_HOST", "MAIL_PORT", "MAIL_FROM", "MAIL_TO"],
            ServiceKind::Webhook => &["ULTRAHOOK_WEBHOOK_URL", "ULTRAHOOK_API_KEY"],
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// What a successful probe observed
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeDetail {
    /// One-line summary for reports
    pub summary: String,
    /// Data read back from the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Set when the probe passed but something looked off
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ProbeDetail {
    pub fn new<S: Into<String>>(summary: S) -> Self {
        Self { summary: summary.into(), data: None, warning: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_warning<S: Into<String>>(mut self, warning: S) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// A smoke test against one service
#[async_trait]
pub trait Probe: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Connect, write, read back, disconnect
    async fn run(&self) -> Result<ProbeDetail>;
}

/// Build the probe for `kind` from loaded configuration
///
/// A service whose settings were rejected at load time cannot be built.
pub fn build_probe(kind: ServiceKind, config: &AppConfig) -> Result<Box<dyn Probe>> {
    if let Some(issue) = config.issue(kind) {
        return Err(issue.to_error());
    }

    let probe: Box<dyn Probe> = match kind {
        ServiceKind::Postgres => Box::new(PostgresProbe::new(config.postgres.clone())),
        ServiceKind::Sqlite => Box::new(SqliteProbe::new(config.sqlite.clone())),
        ServiceKind::Mongo => Box::new(MongoProbe::new(config.mongo.clone())),
        ServiceKind::Redis => Box::new(RedisProbe::new(config.redis.clone())),
        ServiceKind::Rabbitmq => Box::new(RabbitMqProbe::new(config.rabbitmq.clone())),
        ServiceKind::Minio => Box::new(MinioProbe::new(config.minio.clone())?),
        ServiceKind::Loki => Box::new(LokiProbe::new(config.loki.clone())?),
        ServiceKind::Mail => Box::new(MailProbe::new(config.mail.clone())),
        ServiceKind::Webhook => Box::new(WebhookProbe::new(&config.webhook)?),
    };
    Ok(probe)
}

/// Bound a connect step that has no timeout of its own
pub(crate) async fn connect_within<T, F>(
    operation: &str,
    limit: Duration,
    connect: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, connect).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, limit.as_millis() as u64)),
    }
}
