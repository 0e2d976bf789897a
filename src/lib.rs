//! # devprobe
//!
//! Smoke tests for the infrastructure a developer runs locally. Each probe
//! connects to one service, performs a minimal write and read, logs what it
//! saw and disconnects.
//!
//! ## Services
//!
//! ```text
//! PostgreSQL  SQLite  MongoDB  Redis  RabbitMQ
//! MinIO (S3)  Loki    SMTP mail catcher  Webhook endpoint
//! ```
//!
//! Probes run one at a time through [`runner::SuiteRunner`]; the
//! [`receiver`] module provides a local endpoint for the webhook probe.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use devprobe::{probes::ServiceKind, runner::SuiteRunner, AppConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let report = SuiteRunner::from_config(&[ServiceKind::Redis], &config).run().await;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod probes;
pub mod receiver;
pub mod runner;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};
pub use observability::init_logging;
pub use probes::{Probe, ProbeDetail, ServiceKind};
pub use runner::{ProbeReport, ProbeStatus, SuiteReport, SuiteRunner};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(APP_NAME, "devprobe");
        assert!(!VERSION.is_empty());
    }
}
