//! # Command Line Interface
//!
//! `devprobe run` smoke tests the local development services,
//! `devprobe list` shows what can be probed and `devprobe serve-webhook`
//! starts the local webhook receiver.

pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::{load_dotenv, AppConfig};
use crate::observability::init_logging;
use crate::probes::ServiceKind;
use crate::receiver;
use crate::runner::SuiteRunner;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "devprobe")]
#[command(about = "Smoke tests for local development infrastructure")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load variables from this file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run smoke tests (postgres, mongo, redis, mail and minio by default)
    Run {
        /// Services to test, in order
        #[arg(value_enum)]
        services: Vec<ServiceKind>,

        /// Test every known service
        #[arg(long, conflicts_with = "services")]
        all: bool,

        /// Stop at the first failing service
        #[arg(long)]
        fail_fast: bool,

        /// Output format for the final report
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// List known services and the variables they read
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Run the local webhook receiver
    ServeWebhook {
        /// Address to bind (overrides WEBHOOK_RECEIVER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides WEBHOOK_RECEIVER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Commands {
    /// Services a `run` invocation resolves to
    pub fn selected_services(services: &[ServiceKind], all: bool) -> Vec<ServiceKind> {
        if all {
            ServiceKind::ALL.to_vec()
        } else if services.is_empty() {
            ServiceKind::DEFAULT_SUITE.to_vec()
        } else {
            services.to_vec()
        }
    }
}

/// Run the CLI application
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    load_dotenv(cli.env_file.as_deref())?;
    let mut config = AppConfig::from_env()?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Run { services, all, fail_fast, output } => {
            let services = Commands::selected_services(&services, all);
            let report = SuiteRunner::from_config(&services, &config)
                .fail_fast(fail_fast)
                .with_banners(output == OutputFormat::Table)
                .run()
                .await;

            output::print_suite_report(&report, output)?;

            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Commands::List { output } => {
            output::print_service_list(output)?;
        }
        Commands::ServeWebhook { host, port } => {
            let mut receiver_config = config.receiver.clone();
            if let Some(host) = host {
                receiver_config.host = host;
            }
            if let Some(port) = port {
                receiver_config.port = port;
            }

            receiver::serve(&receiver_config, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Webhook receiver shutdown listener failed");
                }
            })
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_parses_services_in_order() {
        let cli = Cli::try_parse_from(["devprobe", "run", "redis", "sqlite", "--fail-fast"]).unwrap();
        match cli.command {
            Commands::Run { services, all, fail_fast, output } => {
                assert_eq!(services, vec![ServiceKind::Redis, ServiceKind::Sqlite]);
                assert!(!all);
                assert!(fail_fast);
                assert_eq!(output, OutputFormat::Table);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_all_conflicts_with_services() {
        assert!(Cli::try_parse_from(["devprobe", "run", "redis", "--all"]).is_err());
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        assert!(Cli::try_parse_from(["devprobe", "run", "cassandra"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["devprobe", "list", "-o", "json", "-v", "--env-file", "dev.env"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.env_file, Some(PathBuf::from("dev.env")));
        assert!(matches!(cli.command, Commands::List { output: OutputFormat::Json }));
    }

    #[test]
    fn test_serve_webhook_overrides() {
        let cli =
            Cli::try_parse_from(["devprobe", "serve-webhook", "--host", "127.0.0.1", "--port", "4000"])
                .unwrap();
        match cli.command {
            Commands::ServeWebhook { host, port } => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(4000));
            }
            _ => panic!("expected serve-webhook"),
        }
    }

    #[test]
    fn test_selected_services() {
        assert_eq!(Commands::selected_services(&[], false), ServiceKind::DEFAULT_SUITE.to_vec());
        assert_eq!(Commands::selected_services(&[], true), ServiceKind::ALL.to_vec());
        assert_eq!(
            Commands::selected_services(&[ServiceKind::Loki], false),
            vec![ServiceKind::Loki]
        );
    }
}
