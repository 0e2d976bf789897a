use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ReceiverConfig;
use crate::errors::{Error, Result};

use super::{router, WEBHOOK_PATH};

/// Bind the configured address and serve until `shutdown` resolves
pub async fn serve<F>(config: &ReceiverConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| Error::io(e, format!("Failed to bind webhook receiver on {}", address)))?;

    serve_on(listener, shutdown).await
}

/// Serve on an already-bound listener
pub async fn serve_on<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map_err(|e| Error::io(e, "Failed to read receiver address"))?;
    info!("Webhook server running on http://{}{}", local, WEBHOOK_PATH);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::io(e, "Webhook receiver failed"))?;

    info!("Webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serve_on_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(serve_on(listener, async {
            let _ = stopped.await;
        }));

        let status = reqwest::Client::new()
            .post(format!("http://{}{}", address, WEBHOOK_PATH))
            .json(&serde_json::json!({ "event": "ping" }))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::OK);

        stop.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ReceiverConfig {
            host: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
        };

        let err = serve(&config, async {}).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
