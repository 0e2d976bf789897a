//! # Suite Runner
//!
//! Runs probes one after another in the order given and collects a
//! [`SuiteReport`]. There is no concurrency here: each probe finishes (and
//! closes its connection) before the next one starts.

pub mod report;

pub use report::{ProbeReport, ProbeStatus, SuiteReport};

use std::time::Instant;

use tracing::{error, info, warn, Instrument};

use crate::config::AppConfig;
use crate::errors::Error;
use crate::probe_span;
use crate::probes::{build_probe, Probe, ServiceKind};

/// A suite entry: either a probe ready to run or the reason it could not be
/// built (for example the webhook probe without a URL).
pub enum PlannedProbe {
    Ready(Box<dyn Probe>),
    Unavailable { service: ServiceKind, error: Error },
}

impl PlannedProbe {
    pub fn service(&self) -> ServiceKind {
        match self {
            PlannedProbe::Ready(probe) => probe.service(),
            PlannedProbe::Unavailable { service, .. } => *service,
        }
    }
}

pub struct SuiteRunner {
    probes: Vec<PlannedProbe>,
    fail_fast: bool,
    banners: bool,
}

impl SuiteRunner {
    pub fn new(probes: Vec<Box<dyn Probe>>) -> Self {
        Self {
            probes: probes.into_iter().map(PlannedProbe::Ready).collect(),
            fail_fast: false,
            banners: true,
        }
    }

    /// Plan `services` in order. Probes that cannot be built still take their
    /// slot and are reported as failed when reached.
    pub fn from_config(services: &[ServiceKind], config: &AppConfig) -> Self {
        let probes = services
            .iter()
            .map(|&service| match build_probe(service, config) {
                Ok(probe) => PlannedProbe::Ready(probe),
                Err(error) => PlannedProbe::Unavailable { service, error },
            })
            .collect();

        Self { probes, fail_fast: false, banners: true }
    }

    /// Stop at the first failure and mark the rest as skipped
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Print `=== Testing X ===` banners to stdout
    pub fn with_banners(mut self, banners: bool) -> Self {
        self.banners = banners;
        self
    }

    pub fn services(&self) -> Vec<ServiceKind> {
        self.probes.iter().map(PlannedProbe::service).collect()
    }

    pub async fn run(self) -> SuiteReport {
        let mut suite = SuiteReport::default();
        let mut aborted = false;

        for planned in self.probes {
            let service = planned.service();

            if aborted {
                suite.push(ProbeReport::skipped(service));
                continue;
            }

            if self.banners {
                println!("\n=== Testing {} ===", service.display_name());
            }

            let report = match planned {
                PlannedProbe::Ready(probe) => run_one(probe.as_ref()).await,
                PlannedProbe::Unavailable { service, error } => {
                    error!(service = %service, error = %error, "Probe could not be set up");
                    ProbeReport::failed(service, 0, &error)
                }
            };

            if report.status == ProbeStatus::Failed && self.fail_fast {
                warn!(service = %service, "Stopping suite after failure");
                aborted = true;
            }
            suite.push(report);
        }

        if self.banners {
            println!("\nAll tests completed!");
        }
        info!(
            passed = suite.passed,
            warnings = suite.warnings,
            failed = suite.failed,
            skipped = suite.skipped,
            "Suite finished"
        );

        suite
    }
}

async fn run_one(probe: &dyn Probe) -> ProbeReport {
    let service = probe.service();
    let span = probe_span!(service);

    async {
        let started = Instant::now();
        let outcome = probe.run().await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(detail) => {
                info!(duration_ms = elapsed.as_millis() as u64, "{}", detail.summary);
                if let Some(warning) = &detail.warning {
                    warn!("{}", warning);
                }
            }
            Err(e) => {
                error!(duration_ms = elapsed.as_millis() as u64, error = %e, "Error testing {}", service.display_name());
            }
        }

        ProbeReport::from_outcome(service, elapsed, outcome)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::probes::ProbeDetail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    struct FakeProbe {
        service: ServiceKind,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Probe for FakeProbe {
        fn service(&self) -> ServiceKind {
            self.service
        }

        async fn run(&self) -> Result<ProbeDetail> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::timeout("connect", 10))
            } else {
                Ok(ProbeDetail::new(format!("{} ok", self.service)))
            }
        }
    }

    fn fake(service: ServiceKind, fail: bool, calls: &Arc<AtomicUsize>) -> Box<dyn Probe> {
        Box::new(FakeProbe { service, fail, calls: Arc::clone(calls) })
    }

    #[tokio::test]
    async fn test_runs_in_order_and_continues_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = SuiteRunner::new(vec![
            fake(ServiceKind::Postgres, false, &calls),
            fake(ServiceKind::Mongo, true, &calls),
            fake(ServiceKind::Redis, false, &calls),
        ])
        .with_banners(false);

        let suite = runner.run().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let order: Vec<_> = suite.probes.iter().map(|r| r.service).collect();
        assert_eq!(order, vec![ServiceKind::Postgres, ServiceKind::Mongo, ServiceKind::Redis]);
        assert_eq!((suite.passed, suite.failed), (2, 1));
        assert!(!suite.is_success());
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining() {
        let calls = Arc::new(AtomicUsize::new(0));
        let suite = SuiteRunner::new(vec![
            fake(ServiceKind::Postgres, true, &calls),
            fake(ServiceKind::Mongo, false, &calls),
            fake(ServiceKind::Redis, false, &calls),
        ])
        .fail_fast(true)
        .with_banners(false)
        .run()
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((suite.failed, suite.skipped), (1, 2));
        assert_eq!(suite.probes[2].status, ProbeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_unbuildable_probe_is_reported_failed() {
        // No ULTRAHOOK_WEBHOOK_URL in the default config
        let config = AppConfig::default();
        let runner = SuiteRunner::from_config(&[ServiceKind::Webhook], &config).with_banners(false);
        assert_eq!(runner.services(), vec![ServiceKind::Webhook]);

        let suite = runner.run().await;
        assert_eq!(suite.failed, 1);
        assert!(suite.probes[0].error.as_deref().unwrap().contains("ULTRAHOOK_WEBHOOK_URL"));
    }

    #[tokio::test]
    async fn test_bad_service_variable_fails_only_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("devdb.sqlite").to_string_lossy().into_owned();
        let lookup = move |key: &str| match key {
            "MINIO_PORT" => Some("nine-thousand".to_string()),
            "SQLITE_DB_PATH" => Some(db_path.clone()),
            _ => None,
        };

        let config = AppConfig::from_lookup(&lookup).unwrap();
        let suite = SuiteRunner::from_config(&[ServiceKind::Sqlite, ServiceKind::Minio], &config)
            .with_banners(false)
            .run()
            .await;

        assert_eq!(suite.probes.len(), 2);
        assert_eq!(suite.probes[0].service, ServiceKind::Sqlite);
        assert_eq!(suite.probes[0].status, ProbeStatus::Passed);
        assert_eq!(suite.probes[1].service, ServiceKind::Minio);
        assert_eq!(suite.probes[1].status, ProbeStatus::Failed);
        assert!(suite.probes[1].error.as_deref().unwrap().contains("MINIO_PORT"));
        assert_eq!((suite.passed, suite.failed), (1, 1));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_logs_probe_outcome() {
        let calls = Arc::new(AtomicUsize::new(0));
        SuiteRunner::new(vec![
            fake(ServiceKind::Sqlite, false, &calls),
            fake(ServiceKind::Loki, true, &calls),
        ])
        .with_banners(false)
        .run()
        .await;

        assert!(logs_contain("sqlite ok"));
        assert!(logs_contain("Error testing Loki"));
        assert!(logs_contain("Suite finished"));
    }
}
