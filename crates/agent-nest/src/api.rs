//! Plain HTTP API
//!
//! Liveness, service status and audit metrics for local operators. The A2A
//! integration is reached only through [`StatusReporter`], so this module
//! works the same whether or not the integration runs.

use crate::adapter::StatusReporter;
use crate::audit::AuditLog;
use agent_stock::AnalysisService;
use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "NASDAQ Stock Agent";

/// Shared state of the API routes
#[derive(Clone)]
pub struct ApiState {
    pub mode: &'static str,
    pub analysis: Arc<dyn AnalysisService>,
    pub audit: Arc<dyn AuditLog>,
    pub nest: Option<Arc<dyn StatusReporter>>,
    started_at: Instant,
}

impl ApiState {
    pub fn new(
        mode: &'static str,
        analysis: Arc<dyn AnalysisService>,
        audit: Arc<dyn AuditLog>,
        nest: Option<Arc<dyn StatusReporter>>,
    ) -> Self {
        Self {
            mode,
            analysis,
            audit,
            nest,
            started_at: Instant::now(),
        }
    }
}

/// Routes of the API port
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .route("/nest", get(nest_status))
        .route("/nest/config", get(nest_config))
        .with_state(state)
}

fn disabled() -> Value {
    json!({
        "status": "disabled",
        "message": "NEST integration is not enabled. Set NEST_ENABLED=true to enable.",
        "timestamp": Utc::now(),
    })
}

fn metrics_value(audit: &dyn AuditLog) -> Value {
    audit
        .stats()
        .map_or(Value::Null, |stats| {
            let average = stats.average_processing_ms();
            let mut value = serde_json::to_value(stats).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("average_processing_ms".into(), json!(average));
            }
            value
        })
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn status(State(state): State<ApiState>) -> Json<Value> {
    let analysis = state.analysis.service_health().await;
    let nest = match &state.nest {
        Some(reporter) => reporter.status_snapshot().await,
        None => disabled(),
    };

    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "mode": state.mode,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "analysis_service": analysis,
        "nest": nest,
        "metrics": metrics_value(state.audit.as_ref()),
        "timestamp": Utc::now(),
    }))
}

async fn metrics(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "metrics": metrics_value(state.audit.as_ref()),
        "timestamp": Utc::now(),
    }))
}

async fn nest_status(State(state): State<ApiState>) -> Json<Value> {
    let Some(reporter) = &state.nest else {
        return Json(disabled());
    };
    let mut snapshot = reporter.status_snapshot().await;
    if let Value::Object(map) = &mut snapshot {
        map.insert("metrics".into(), metrics_value(state.audit.as_ref()));
    }
    Json(json!({
        "success": true,
        "nest_status": snapshot,
        "timestamp": Utc::now(),
    }))
}

async fn nest_config(State(state): State<ApiState>) -> Json<Value> {
    match &state.nest {
        Some(reporter) => Json(json!({
            "success": true,
            "agent_config": reporter.agent_config(),
            "timestamp": Utc::now(),
        })),
        None => Json(disabled()),
    }
}
