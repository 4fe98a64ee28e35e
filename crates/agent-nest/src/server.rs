//! A2A HTTP endpoint
//!
//! Peers deliver wire messages to `POST /a2a`. The reply is always a wire
//! message, including for bodies that are not JSON at all.

use crate::adapter::NestAdapter;
use crate::error::NestError;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Routes of the agent port
pub fn router(adapter: Arc<NestAdapter>) -> Router {
    Router::new()
        .route("/a2a", post(receive_message))
        .route("/agent", get(agent_document))
        .route("/health", get(health))
        .with_state(adapter)
}

/// Serve `router` on an already bound listener with graceful shutdown
pub async fn serve_on(
    listener: TcpListener,
    router: Router,
    name: &'static str,
    shutdown: CancellationToken,
) -> Result<(), NestError> {
    let addr: SocketAddr = listener.local_addr()?;
    info!("{name} server listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("{name} server on {addr} stopped");
    Ok(())
}

async fn receive_message(State(adapter): State<Arc<NestAdapter>>, body: Bytes) -> Json<Value> {
    let bridge = adapter.bridge();
    let reply = match serde_json::from_slice::<Value>(&body) {
        Ok(raw) => bridge.handle_message(&raw).await,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "undecodable A2A request body");
            bridge.reject_malformed(&format!("invalid JSON: {e}"))
        }
    };
    Json(reply.to_value())
}

async fn agent_document(State(adapter): State<Arc<NestAdapter>>) -> Json<Value> {
    let health = adapter.bridge().health().await;
    let mut document = adapter.config().peer_document(&health.status.to_string());
    if let Value::Object(map) = &mut document {
        map.insert("running".into(), Value::Bool(adapter.is_running()));
        map.insert(
            "registered".into(),
            Value::Bool(adapter.registry().is_some_and(|r| r.is_registered())),
        );
    }
    Json(document)
}

async fn health(State(adapter): State<Arc<NestAdapter>>) -> Json<Value> {
    let health = adapter.bridge().health().await;
    Json(serde_json::to_value(health).unwrap_or(Value::Null))
}
