//! End-to-end webhook delivery: the probe posts to a locally running receiver.

use devprobe::config::{AppConfig, SqliteConfig, WebhookConfig};
use devprobe::probes::{Probe, WebhookProbe};
use devprobe::receiver::{serve_on, WEBHOOK_PATH};
use devprobe::{ProbeStatus, ServiceKind, SuiteRunner};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningReceiver {
    url: String,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<devprobe::Result<()>>,
}

impl RunningReceiver {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind receiver");
        let address = listener.local_addr().expect("receiver address");
        let (stop, stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve_on(listener, async {
            let _ = stopped.await;
        }));

        Self { url: format!("http://{}{}", address, WEBHOOK_PATH), stop, handle }
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.handle.await.expect("receiver task").expect("receiver stopped cleanly");
    }
}

#[tokio::test]
async fn test_probe_delivers_to_receiver() {
    let receiver = RunningReceiver::start().await;

    let probe = WebhookProbe::new(&WebhookConfig {
        url: Some(receiver.url.clone()),
        api_key: Some("local-key".to_string()),
    })
    .unwrap();
    let detail = probe.run().await.unwrap();
    assert_eq!(detail.summary, "Response: 200 OK");
    drop(probe);

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_suite_with_sqlite_and_webhook() {
    let receiver = RunningReceiver::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.webhook.url = Some(receiver.url.clone());
    config.sqlite = SqliteConfig { path: dir.path().join("nested").join("devdb.sqlite") };

    let report = SuiteRunner::from_config(&[ServiceKind::Sqlite, ServiceKind::Webhook], &config)
        .with_banners(false)
        .run()
        .await;

    assert!(report.is_success(), "suite failed: {:?}", report.probes);
    assert_eq!(report.passed, 2);
    assert!(report.probes.iter().all(|p| p.status == ProbeStatus::Passed));
    assert!(dir.path().join("nested").join("devdb.sqlite").exists());

    receiver.shutdown().await;
}

#[tokio::test]
async fn test_suite_reports_stopped_receiver() {
    let receiver = RunningReceiver::start().await;
    let url = receiver.url.clone();
    receiver.shutdown().await;

    let mut config = AppConfig::default();
    config.webhook.url = Some(url);

    let report = SuiteRunner::from_config(&[ServiceKind::Webhook], &config)
        .with_banners(false)
        .run()
        .await;

    assert_eq!(report.failed, 1);
    assert!(report.probes[0].hint.is_some());
}
