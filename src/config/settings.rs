//! # Configuration Settings
//!
//! Connection settings for each smoke-tested service. Variable names match
//! the ones a typical local `docker compose` stack exports.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use super::{bool_var, optional_var, parsed_var, sanitize_url, string_var, EnvLookup};
use crate::errors::{Error, Result};
use crate::probes::ServiceKind;

/// Connect timeout applied to probes whose client has no timeout of its own
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Settings for every probe, loaded in one pass
///
/// A service section that fails to parse or validate falls back to its
/// defaults and is recorded in `issues`; only that service's probe fails.
/// Receiver and logging problems fail the whole load.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub postgres: PostgresConfig,
    pub sqlite: SqliteConfig,
    pub mongo: MongoConfig,
    pub redis: RedisConfig,
    pub rabbitmq: RabbitMqConfig,
    pub minio: MinioConfig,
    pub loki: LokiConfig,
    pub mail: MailConfig,
    pub webhook: WebhookConfig,
    pub receiver: ReceiverConfig,
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub issues: HashMap<ServiceKind, ConfigIssue>,
}

/// A service section that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub message: String,
    pub variable: Option<String>,
}

impl ConfigIssue {
    pub fn to_error(&self) -> Error {
        Error::Config { message: self.message.clone(), variable: self.variable.clone() }
    }
}

impl From<Error> for ConfigIssue {
    fn from(error: Error) -> Self {
        match error {
            Error::Config { message, variable } => Self { message, variable },
            Error::Validation { message } => Self { message, variable: None },
            other => Self { message: other.to_string(), variable: None },
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&super::process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let receiver = ReceiverConfig::from_lookup(lookup)?;
        receiver.validate()?;
        let logging = LoggingConfig::from_lookup(lookup);
        logging.validate()?;

        let mut issues = HashMap::new();
        let postgres = PostgresConfig::from_lookup(lookup);
        let redis = RedisConfig::from_lookup(lookup);
        let rabbitmq = RabbitMqConfig::from_lookup(lookup);
        let minio = MinioConfig::from_lookup(lookup);
        let loki = LokiConfig::from_lookup(lookup);
        let mail = MailConfig::from_lookup(lookup);

        Ok(Self {
            postgres: section(&mut issues, ServiceKind::Postgres, postgres),
            sqlite: section(&mut issues, ServiceKind::Sqlite, Ok(SqliteConfig::from_lookup(lookup))),
            mongo: section(&mut issues, ServiceKind::Mongo, Ok(MongoConfig::from_lookup(lookup))),
            redis: section(&mut issues, ServiceKind::Redis, redis),
            rabbitmq: section(&mut issues, ServiceKind::Rabbitmq, rabbitmq),
            minio: section(&mut issues, ServiceKind::Minio, minio),
            loki: section(&mut issues, ServiceKind::Loki, loki),
            mail: section(&mut issues, ServiceKind::Mail, mail),
            webhook: WebhookConfig::from_lookup(lookup),
            receiver,
            logging,
            issues,
        })
    }

    /// Why `kind` could not be configured, if it could not
    pub fn issue(&self, kind: ServiceKind) -> Option<&ConfigIssue> {
        self.issues.get(&kind)
    }
}

fn section<T: Validate + Default>(
    issues: &mut HashMap<ServiceKind, ConfigIssue>,
    kind: ServiceKind,
    loaded: Result<T>,
) -> T {
    let checked = loaded.and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match checked {
        Ok(config) => config,
        Err(e) => {
            warn!(service = %kind, error = %e, "Service configuration rejected");
            issues.insert(kind, ConfigIssue::from(e));
            T::default()
        }
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostgresConfig {
    #[validate(length(min = 1, message = "POSTGRES_HOST cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "POSTGRES_PORT must be between 1 and 65535"))]
    pub port: u16,

    #[validate(length(min = 1, message = "POSTGRES_USER cannot be empty"))]
    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    #[validate(length(min = 1, message = "POSTGRES_DB cannot be empty"))]
    pub database: String,

    pub connect_timeout_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            connect_timeout_seconds: DEFAULT_CONNECT_TIMEOUT_SECONDS,
        }
    }
}

impl PostgresConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "POSTGRES_HOST", &defaults.host),
            port: parsed_var(lookup, "POSTGRES_PORT", defaults.port)?,
            user: string_var(lookup, "POSTGRES_USER", &defaults.user),
            password: optional_var(lookup, "POSTGRES_PASSWORD").unwrap_or_default(),
            database: string_var(lookup, "POSTGRES_DB", &defaults.database),
            connect_timeout_seconds: parsed_var(
                lookup,
                "POSTGRES_CONNECT_TIMEOUT_SECONDS",
                defaults.connect_timeout_seconds,
            )?,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Connection URL with credentials masked
    pub fn display_url(&self) -> String {
        sanitize_url(&format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        ))
    }
}

/// SQLite database file settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("./data/devdb.sqlite") }
    }
}

impl SqliteConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        optional_var(lookup, "SQLITE_DB_PATH")
            .map(|path| Self { path: PathBuf::from(path) })
            .unwrap_or_default()
    }
}

/// MongoDB connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MongoConfig {
    #[validate(length(min = 1, message = "MONGO_URI cannot be empty"))]
    #[serde(skip_serializing)]
    pub uri: String,

    #[validate(length(min = 1, message = "MONGO_DATABASE cannot be empty"))]
    pub database: String,

    #[validate(length(min = 1, message = "MONGO_COLLECTION cannot be empty"))]
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "test".to_string(),
            collection: "users-test".to_string(),
        }
    }
}

impl MongoConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            uri: string_var(lookup, "MONGO_URI", &defaults.uri),
            database: string_var(lookup, "MONGO_DATABASE", &defaults.database),
            collection: string_var(lookup, "MONGO_COLLECTION", &defaults.collection),
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedisConfig {
    #[validate(length(min = 1, message = "REDIS_HOST cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "REDIS_PORT must be between 1 and 65535"))]
    pub port: u16,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { host: "localhost".to_string(), port: 6379 }
    }
}

impl RedisConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "REDIS_HOST", &defaults.host),
            port: parsed_var(lookup, "REDIS_PORT", defaults.port)?,
        })
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// RabbitMQ connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RabbitMqConfig {
    #[validate(length(min = 1, message = "RABBITMQ_HOST cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "RABBITMQ_PORT must be between 1 and 65535"))]
    pub port: u16,

    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    #[validate(length(min = 1, message = "RABBITMQ_QUEUE cannot be empty"))]
    pub queue: String,

    /// How long to wait for the published message to come back
    #[validate(range(min = 1, message = "RABBITMQ_CONSUME_TIMEOUT_MS must be positive"))]
    pub consume_timeout_ms: u64,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            queue: "test-queue".to_string(),
            consume_timeout_ms: 3000,
        }
    }
}

impl RabbitMqConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "RABBITMQ_HOST", &defaults.host),
            port: parsed_var(lookup, "RABBITMQ_PORT", defaults.port)?,
            user: string_var(lookup, "RABBITMQ_USER", &defaults.user),
            password: string_var(lookup, "RABBITMQ_PASS", &defaults.password),
            queue: string_var(lookup, "RABBITMQ_QUEUE", &defaults.queue),
            consume_timeout_ms: parsed_var(
                lookup,
                "RABBITMQ_CONSUME_TIMEOUT_MS",
                defaults.consume_timeout_ms,
            )?,
        })
    }

    /// Broker URL with the credentials percent-encoded
    pub fn amqp_url(&self) -> Result<String> {
        let invalid = |detail: String| {
            Error::config_var(format!("Invalid RabbitMQ address: {}", detail), "RABBITMQ_HOST")
        };

        let mut url = url::Url::parse(&format!("amqp://{}:{}", self.host, self.port))
            .map_err(|e| invalid(e.to_string()))?;
        url.set_username(&self.user).map_err(|_| invalid("cannot carry a username".into()))?;
        url.set_password(Some(&self.password))
            .map_err(|_| invalid("cannot carry a password".into()))?;

        Ok(url.to_string())
    }

    pub fn display_url(&self) -> String {
        sanitize_url(&format!("amqp://{}:{}@{}:{}", self.user, self.password, self.host, self.port))
    }

    pub fn consume_timeout(&self) -> Duration {
        Duration::from_millis(self.consume_timeout_ms)
    }
}

/// MinIO (S3 API) settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MinioConfig {
    #[validate(length(min = 1, message = "MINIO_ENDPOINT cannot be empty"))]
    pub endpoint: String,

    #[validate(range(min = 1, message = "MINIO_PORT must be between 1 and 65535"))]
    pub port: u16,

    pub use_ssl: bool,

    #[serde(skip_serializing)]
    pub access_key: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    #[validate(length(min = 3, max = 63, message = "MINIO_BUCKET must be 3-63 characters"))]
    pub bucket: String,

    pub region: String,
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost".to_string(),
            port: 9000,
            use_ssl: false,
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

impl MinioConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            endpoint: string_var(lookup, "MINIO_ENDPOINT", &defaults.endpoint),
            port: parsed_var(lookup, "MINIO_PORT", defaults.port)?,
            use_ssl: bool_var(lookup, "MINIO_USE_SSL", defaults.use_ssl),
            access_key: string_var(lookup, "MINIO_ACCESS_KEY", &defaults.access_key),
            secret_key: string_var(lookup, "MINIO_SECRET_KEY", &defaults.secret_key),
            bucket: string_var(lookup, "MINIO_BUCKET", &defaults.bucket),
            region: string_var(lookup, "MINIO_REGION", &defaults.region),
        })
    }

    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.endpoint, self.port)
    }
}

/// Loki push settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LokiConfig {
    #[validate(length(min = 1, message = "LOKI_HOST cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "LOKI_PORT must be between 1 and 65535"))]
    pub port: u16,

    #[validate(range(min = 1, max = 100, message = "LOKI_MAX_RETRIES must be between 1 and 100"))]
    pub max_retries: u32,

    pub retry_delay_ms: u64,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self { host: "localhost".to_string(), port: 3100, max_retries: 5, retry_delay_ms: 2000 }
    }
}

impl LokiConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "LOKI_HOST", &defaults.host),
            port: parsed_var(lookup, "LOKI_PORT", defaults.port)?,
            max_retries: parsed_var(lookup, "LOKI_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: parsed_var(lookup, "LOKI_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
        })
    }

    pub fn push_url(&self) -> String {
        format!("http://{}:{}/loki/api/v1/push", self.host, self.port)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// SMTP mail catcher settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MailConfig {
    #[validate(length(min = 1, message = "MAIL_HOST cannot be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "MAIL_PORT must be between 1 and 65535"))]
    pub port: u16,

    #[validate(length(min = 3, message = "MAIL_FROM must be at least 3 characters"))]
    pub from: String,

    #[validate(length(min = 3, message = "MAIL_TO must be at least 3 characters"))]
    pub to: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1025,
            from: "devprobe@localhost.dev".to_string(),
            to: "user@test.com".to_string(),
        }
    }
}

impl MailConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "MAIL_HOST", &defaults.host),
            port: parsed_var(lookup, "MAIL_PORT", defaults.port)?,
            from: string_var(lookup, "MAIL_FROM", &defaults.from),
            to: string_var(lookup, "MAIL_TO", &defaults.to),
        })
    }
}

/// Outgoing webhook settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl WebhookConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        Self {
            url: optional_var(lookup, "ULTRAHOOK_WEBHOOK_URL"),
            api_key: optional_var(lookup, "ULTRAHOOK_API_KEY"),
        }
    }

    /// Parse the target URL; only the webhook probe needs one
    pub fn target(&self) -> Result<url::Url> {
        let raw = self.url.as_deref().ok_or_else(|| {
            Error::config_var("ULTRAHOOK_WEBHOOK_URL is not set", "ULTRAHOOK_WEBHOOK_URL")
        })?;
        let parsed = url::Url::parse(raw).map_err(|e| {
            Error::config_var(
                format!("Invalid ULTRAHOOK_WEBHOOK_URL '{}': {}", raw, e),
                "ULTRAHOOK_WEBHOOK_URL",
            )
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(Error::config_var(
                format!("ULTRAHOOK_WEBHOOK_URL must use http or https, got '{}'", other),
                "ULTRAHOOK_WEBHOOK_URL",
            )),
        }
    }
}

/// Local webhook receiver bind settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiverConfig {
    #[validate(length(min = 1, message = "WEBHOOK_RECEIVER_HOST cannot be empty"))]
    pub host: String,

    pub port: u16,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 3001 }
    }
}

impl ReceiverConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: string_var(lookup, "WEBHOOK_RECEIVER_HOST", &defaults.host),
            port: parsed_var(lookup, "WEBHOOK_RECEIVER_PORT", defaults.port)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Enable JSON structured logging
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl LoggingConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        Self {
            level: string_var(lookup, "DEVPROBE_LOG_LEVEL", "info"),
            json: bool_var(lookup, "DEVPROBE_JSON_LOGS", false),
        }
    }
}
