//! Output formatting for CLI commands
//!
//! Reports can be printed as JSON, YAML or a coloured table.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::probes::ServiceKind;
use crate::runner::{ProbeStatus, SuiteReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a horizontal separator line
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    println!();
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    print_separator(total_width.saturating_sub(1));
}

fn status_cell(status: ProbeStatus, width: usize) -> String {
    let padded = format!("{:<width$}", status.as_str().to_uppercase(), width = width);
    match status {
        ProbeStatus::Passed => padded.green().to_string(),
        ProbeStatus::Warning => padded.yellow().to_string(),
        ProbeStatus::Failed => padded.red().to_string(),
        ProbeStatus::Skipped => padded.dimmed().to_string(),
    }
}

/// Render a suite report in the requested format
pub fn print_suite_report(report: &SuiteReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Yaml => print_yaml(report),
        OutputFormat::Table => {
            print_suite_table(report);
            Ok(())
        }
    }
}

fn print_suite_table(report: &SuiteReport) {
    print_table_header(&[("SERVICE", 12), ("STATUS", 8), ("TIME", 8), ("DETAIL", 60)]);

    for probe in &report.probes {
        let detail = probe.error.as_deref().unwrap_or(&probe.summary);
        println!(
            "{:<12} {} {:<8} {}",
            probe.service.display_name(),
            status_cell(probe.status, 8),
            format!("{}ms", probe.duration_ms),
            truncate(detail, 60)
        );
        if let Some(warning) = &probe.warning {
            println!("{:<12} {:<8} {:<8} {}", "", "", "", format!("warning: {}", warning).yellow());
        }
        if let Some(hint) = &probe.hint {
            println!("{:<12} {:<8} {:<8} {}", "", "", "", format!("hint: {}", hint).cyan());
        }
    }

    println!();
    println!(
        "{} passed, {} warning(s), {} failed, {} skipped",
        report.passed, report.warnings, report.failed, report.skipped
    );
}

#[derive(Debug, Serialize)]
struct ServiceListing {
    service: &'static str,
    name: &'static str,
    in_default_suite: bool,
    variables: Vec<&'static str>,
}

/// Render the known services and the variables they read
pub fn print_service_list(format: OutputFormat) -> Result<()> {
    let listing: Vec<ServiceListing> = ServiceKind::ALL
        .iter()
        .map(|kind| ServiceListing {
            service: kind.cli_name(),
            name: kind.display_name(),
            in_default_suite: ServiceKind::DEFAULT_SUITE.contains(kind),
            variables: kind.env_vars().to_vec(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&listing),
        OutputFormat::Yaml => print_yaml(&listing),
        OutputFormat::Table => {
            print_table_header(&[("SERVICE", 10), ("NAME", 12), ("DEFAULT", 7), ("VARIABLES", 60)]);
            for entry in &listing {
                println!(
                    "{:<10} {:<12} {:<7} {}",
                    entry.service,
                    entry.name,
                    if entry.in_default_suite { "yes" } else { "no" },
                    entry.variables.join(", ")
                );
            }
            println!();
            Ok(())
        }
    }
}
