//! # Structured Logging
//!
//! Installs a `tracing-subscriber` formatter driven by `RUST_LOG` (or the
//! configured level) and provides span macros for probe runs.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::Result;

/// Create a tracing span for a single probe run.
///
/// ```rust,ignore
/// let span = probe_span!(ServiceKind::Redis);
/// let span = probe_span!(ServiceKind::Loki, attempt = 2);
/// ```
#[macro_export]
macro_rules! probe_span {
    ($service:expr) => {
        tracing::info_span!(
            "probe",
            service = %$service,
            probe_id = %uuid::Uuid::new_v4()
        )
    };
    ($service:expr, $($field:tt)*) => {
        tracing::info_span!(
            "probe",
            service = %$service,
            probe_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Initialise the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Events go to stderr so that
/// reports on stdout stay machine-readable. Calling this twice is not an
/// error; the first subscriber stays installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialised");
    }

    Ok(())
}

/// Pick the first directive string that parses: `RUST_LOG`, the configured
/// level, then `info`
fn env_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
