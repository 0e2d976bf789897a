//! Result records for probe runs

use std::time::Duration;

use serde::Serialize;

use crate::errors::{Error, Result};
use crate::probes::{ProbeDetail, ServiceKind};

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Passed,
    /// Passed, but the probe flagged something worth a look
    Warning,
    Failed,
    /// Not run because an earlier probe failed under `--fail-fast`
    Skipped,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Passed => "passed",
            ProbeStatus::Warning => "warning",
            ProbeStatus::Failed => "failed",
            ProbeStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub service: ServiceKind,
    pub status: ProbeStatus,
    pub duration_ms: u64,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProbeReport {
    pub fn from_outcome(service: ServiceKind, elapsed: Duration, outcome: Result<ProbeDetail>) -> Self {
        let duration_ms = elapsed.as_millis() as u64;
        match outcome {
            Ok(detail) => Self {
                service,
                status: if detail.warning.is_some() {
                    ProbeStatus::Warning
                } else {
                    ProbeStatus::Passed
                },
                duration_ms,
                summary: detail.summary,
                warning: detail.warning,
                error: None,
                hint: None,
                data: detail.data,
            },
            Err(e) => Self::failed(service, duration_ms, &e),
        }
    }

    pub fn failed(service: ServiceKind, duration_ms: u64, error: &Error) -> Self {
        Self {
            service,
            status: ProbeStatus::Failed,
            duration_ms,
            summary: format!("{} test failed", service.display_name()),
            warning: None,
            error: Some(error_chain(error)),
            hint: error.hint().map(str::to_string),
            data: None,
        }
    }

    pub fn skipped(service: ServiceKind) -> Self {
        Self {
            service,
            status: ProbeStatus::Skipped,
            duration_ms: 0,
            summary: "skipped after an earlier failure".to_string(),
            warning: None,
            error: None,
            hint: None,
            data: None,
        }
    }
}

/// Render an error with its sources, outermost first
fn error_chain(error: &Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Everything one `run` produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub probes: Vec<ProbeReport>,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SuiteReport {
    pub fn push(&mut self, report: ProbeReport) {
        match report.status {
            ProbeStatus::Passed => self.passed += 1,
            ProbeStatus::Warning => self.warnings += 1,
            ProbeStatus::Failed => self.failed += 1,
            ProbeStatus::Skipped => self.skipped += 1,
        }
        self.probes.push(report);
    }

    /// True when nothing failed; warnings and skips alone don't fail a suite
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
