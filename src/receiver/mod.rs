//! # Webhook Receiver
//!
//! A local endpoint that the webhook probe (or a tunnel such as Ultrahook)
//! can deliver to. It logs whatever JSON arrives and answers `OK`.

mod server;

pub use server::{serve, serve_on};

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const WEBHOOK_PATH: &str = "/webhook-test";

pub fn router() -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive_webhook))
        .layer(TraceLayer::new_for_http())
}

async fn receive_webhook(Json(body): Json<Value>) -> (StatusCode, &'static str) {
    info!(body = %body, "Webhook received");
    (StatusCode::OK, "OK")
}
