//! # Error Types
//!
//! Error types for the devprobe smoke tests using `thiserror`.

/// Custom result type for devprobe operations
pub type Result<T> = std::result::Result<T, Error>;

const DNS_HINT: &str = "DNS resolution failed. Check if the URL hostname is correct.";
const CONNECTION_REFUSED_HINT: &str = "Connection refused. Check if the service is running.";
const CERTIFICATE_HINT: &str =
    "TLS certificate validation failed. This is common in development environments.";

/// Main error type for devprobe
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String, variable: Option<String> },

    /// Validation errors (bad config values, unexpected read-back values)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// PostgreSQL and SQLite errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// MongoDB errors
    #[error("MongoDB error: {context}")]
    Mongo {
        #[source]
        source: mongodb::error::Error,
        context: String,
    },

    /// Redis errors
    #[error("Redis error: {context}")]
    Redis {
        #[source]
        source: redis::RedisError,
        context: String,
    },

    /// RabbitMQ (AMQP) errors
    #[error("AMQP error: {context}")]
    Amqp {
        #[source]
        source: lapin::Error,
        context: String,
    },

    /// S3-compatible object store errors
    #[error("Object store error: {context}")]
    ObjectStore {
        #[source]
        source: object_store::Error,
        context: String,
    },

    /// SMTP and message building errors
    #[error("Mail error: {message}")]
    Mail {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Non-success HTTP responses
    #[error("HTTP error: {message} (status: {status})")]
    Http { message: String, status: u16 },

    /// HTTP transport errors
    #[error("Request error: {context}")]
    Request {
        #[source]
        source: reqwest::Error,
        context: String,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Timeout errors
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), variable: None }
    }

    /// Create a configuration error tied to an environment variable
    pub fn config_var<S: Into<String>, V: Into<String>>(message: S, variable: V) -> Self {
        Self::Config { message: message.into(), variable: Some(variable.into()) }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    pub fn mongo<S: Into<String>>(source: mongodb::error::Error, context: S) -> Self {
        Self::Mongo { source, context: context.into() }
    }

    pub fn redis<S: Into<String>>(source: redis::RedisError, context: S) -> Self {
        Self::Redis { source, context: context.into() }
    }

    pub fn amqp<S: Into<String>>(source: lapin::Error, context: S) -> Self {
        Self::Amqp { source, context: context.into() }
    }

    pub fn object_store<S: Into<String>>(source: object_store::Error, context: S) -> Self {
        Self::ObjectStore { source, context: context.into() }
    }

    /// Create a mail error with its underlying cause
    pub fn mail<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Mail { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create an HTTP error
    pub fn http<S: Into<String>>(message: S, status: u16) -> Self {
        Self::Http { message: message.into(), status }
    }

    pub fn request<S: Into<String>>(source: reqwest::Error, context: S) -> Self {
        Self::Request { source, context: context.into() }
    }

    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Io { .. } => true,
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            Error::Request { source, .. } => source.is_connect() || source.is_timeout(),
            Error::Database { source, .. } => {
                matches!(source, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
            }
            Error::Redis { source, .. } => {
                source.is_io_error() || source.is_timeout() || source.is_connection_dropped()
            }
            _ => false,
        }
    }

    /// Operator-facing hint for common HTTP transport failures
    pub fn hint(&self) -> Option<&'static str> {
        let Error::Request { source, .. } = self else {
            return None;
        };

        let mut messages = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(source);
        while let Some(err) = current {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if io.kind() == std::io::ErrorKind::ConnectionRefused {
                    return Some(CONNECTION_REFUSED_HINT);
                }
            }
            messages.push(err.to_string());
            current = err.source();
        }

        classify_transport_failure(&messages.join(": "))
    }
}

/// Map a flattened transport error chain to a hint
fn classify_transport_failure(chain: &str) -> Option<&'static str> {
    let chain = chain.to_lowercase();
    if chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
    {
        Some(DNS_HINT)
    } else if chain.contains("connection refused") {
        Some(CONNECTION_REFUSED_HINT)
    } else if chain.contains("certificate") || chain.contains("unknownissuer") {
        Some(CERTIFICATE_HINT)
    } else {
        None
    }
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error, "Database operation failed")
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(error: mongodb::error::Error) -> Self {
        Self::mongo(error, "MongoDB operation failed")
    }
}

impl From<redis::RedisError> for Error {
    fn from(error: redis::RedisError) -> Self {
        Self::redis(error, "Redis command failed")
    }
}

impl From<lapin::Error> for Error {
    fn from(error: lapin::Error) -> Self {
        Self::amqp(error, "AMQP operation failed")
    }
}

impl From<object_store::Error> for Error {
    fn from(error: object_store::Error) -> Self {
        Self::object_store(error, "Object store operation failed")
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::request(error, "HTTP request failed")
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::io(error, "I/O operation failed")
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages(&errors, &mut messages);
        messages.sort();

        Self::validation(format!("Validation failed: {}", messages.join("; ")))
    }
}

/// Flatten field errors, descending into nested structs and lists
fn collect_validation_messages(errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                out.push(format!("{}: {}", field, error_messages.join(", ")));
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_validation_messages(inner, out);
                }
            }
        }
    }
}
