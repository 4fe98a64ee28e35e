//! In-process collaborators for tests: registry and peer servers bound to
//! `127.0.0.1:0`, an in-memory audit sink and a mocked analysis service.

use crate::audit::{AuditEvent, AuditLog, Outcome, RegistryOperation};
use agent_stock::{
    AnalysisService, InvestmentRecommendation, MarketData, Recommendation, ServiceHealth,
    StockAnalysis,
};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

mockall::mock! {
    pub Analysis {}

    #[async_trait]
    impl AnalysisService for Analysis {
        async fn perform_complete_analysis(
            &self,
            ticker: &str,
            query_text: &str,
        ) -> agent_stock::Result<StockAnalysis>;

        async fn service_health(&self) -> ServiceHealth;
    }
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_router(router: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), handle)
}

/// URL of a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A buy-rated analysis for `ticker`
pub fn buy_analysis(ticker: &str, confidence: f64) -> StockAnalysis {
    StockAnalysis::new(ticker, format!("{ticker} Corp"))
        .with_market_data(MarketData::new(189.5, 185.0))
        .with_recommendation(
            InvestmentRecommendation::new(Recommendation::Buy, confidence)
                .with_factor("Revenue growth")
                .with_risk("Moderate")
                .with_reasoning("Trend and fundamentals agree"),
        )
        .with_summary("Solid outlook.")
}

/// Analysis mock answering every ticker with `buy_analysis` and reporting healthy
pub fn healthy_analysis() -> MockAnalysis {
    let mut mock = MockAnalysis::new();
    mock.expect_perform_complete_analysis()
        .returning(|ticker, _| Ok(buy_analysis(ticker, 85.0)));
    mock.expect_service_health()
        .returning(ServiceHealth::healthy);
    mock
}

/// Audit sink that keeps every event
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn registry_events(&self) -> Vec<(RegistryOperation, bool, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AuditEvent::Registry {
                    operation,
                    success,
                    attempts,
                    ..
                } => Some((operation, success, attempts)),
                _ => None,
            })
            .collect()
    }

    pub fn outcomes(&self) -> Vec<(Outcome, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AuditEvent::Completed {
                    outcome,
                    elapsed_ms,
                    ..
                } => Some((outcome, elapsed_ms)),
                _ => None,
            })
            .collect()
    }

    pub fn incoming_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, AuditEvent::Incoming { .. }))
            .count()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    agents: Mutex<HashMap<String, Value>>,
    fail_with: Mutex<Option<u16>>,
    register_delay: Mutex<Option<std::time::Duration>>,
}

impl RegistryState {
    fn forced(&self) -> Option<Response> {
        let code = (*self.fail_with.lock().unwrap())?;
        let status = StatusCode::from_u16(code).unwrap();
        Some((status, "forced failure").into_response())
    }
}

/// In-memory registry speaking the discovery protocol
pub struct MockRegistry {
    pub url: String,
    state: Arc<RegistryState>,
    server: JoinHandle<()>,
}

impl MockRegistry {
    pub fn agent(&self, id: &str) -> Option<Value> {
        self.state.agents.lock().unwrap().get(id).cloned()
    }

    pub fn insert(&self, id: &str, record: Value) {
        self.state
            .agents
            .lock()
            .unwrap()
            .insert(id.to_string(), record);
    }

    pub fn remove(&self, id: &str) {
        self.state.agents.lock().unwrap().remove(id);
    }

    /// Answer every request with `code` until reset with `None`
    pub fn fail_with(&self, code: Option<u16>) {
        *self.state.fail_with.lock().unwrap() = code;
    }

    /// Hold every registration for `delay` before answering
    pub fn delay_register(&self, delay: std::time::Duration) {
        *self.state.register_delay.lock().unwrap() = Some(delay);
    }
}

impl Drop for MockRegistry {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn register_agent(
    State(state): State<Arc<RegistryState>>,
    Json(body): Json<Value>,
) -> Response {
    let delay = *state.register_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(forced) = state.forced() {
        return forced;
    }
    let id = body["agent_id"].as_str().unwrap_or_default().to_string();
    state.agents.lock().unwrap().insert(id, body);
    (StatusCode::CREATED, Json(json!({"status": "registered"}))).into_response()
}

async fn update_status(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(forced) = state.forced() {
        return forced;
    }
    let mut agents = state.agents.lock().unwrap();
    match agents.get_mut(&id) {
        Some(record) => {
            record["status"] = body["status"].clone();
            record["last_updated"] = body["last_updated"].clone();
            Json(record.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_agent(State(state): State<Arc<RegistryState>>, Path(id): Path<String>) -> Response {
    if let Some(forced) = state.forced() {
        return forced;
    }
    match state.agents.lock().unwrap().get(&id) {
        Some(record) => Json(record.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_agent(State(state): State<Arc<RegistryState>>, Path(id): Path<String>) -> Response {
    if let Some(forced) = state.forced() {
        return forced;
    }
    match state.agents.lock().unwrap().remove(&id) {
        Some(_) => Json(json!({"status": "deregistered"})).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_agents(
    State(state): State<Arc<RegistryState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(forced) = state.forced() {
        return forced;
    }
    let agents: Vec<Value> = state
        .agents
        .lock()
        .unwrap()
        .values()
        .filter(|record| {
            params.get("capability").is_none_or(|cap| {
                record["capabilities"]
                    .as_array()
                    .is_some_and(|caps| caps.iter().any(|c| c == cap.as_str()))
            })
        })
        .filter(|record| {
            params
                .get("domain")
                .is_none_or(|domain| record["domain"] == domain.as_str())
        })
        .cloned()
        .collect();
    Json(json!({ "agents": agents })).into_response()
}

/// Start an in-memory registry
pub async fn spawn_registry() -> MockRegistry {
    let state = Arc::new(RegistryState::default());
    let router = Router::new()
        .route("/agents/register", post(register_agent))
        .route("/agents", get(list_agents))
        .route("/agents/{id}", get(get_agent).delete(delete_agent))
        .route("/agents/{id}/status", put(update_status))
        .with_state(state.clone());
    let (url, server) = spawn_router(router).await;
    MockRegistry { url, state, server }
}

/// Peer agent that records what it receives and answers with a fixed text
pub struct MockPeer {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
    server: JoinHandle<()>,
}

impl MockPeer {
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for MockPeer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Start a peer answering `POST /a2a` with `reply`
pub async fn spawn_peer(reply: &str) -> MockPeer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();
    let reply = reply.to_string();

    let router = Router::new().route(
        "/a2a",
        post(move |Json(body): Json<Value>| {
            let log = log.clone();
            let reply = reply.clone();
            async move {
                let conversation_id = body["conversation_id"].clone();
                log.lock().unwrap().push(body);
                Json(json!({
                    "role": "agent",
                    "content": {"text": reply, "type": "text"},
                    "conversation_id": conversation_id
                }))
            }
        }),
    );
    let (url, server) = spawn_router(router).await;
    MockPeer {
        url,
        received,
        server,
    }
}

/// Enabled configuration with fast timings, optionally pointing at a registry
pub fn nest_config(registry_url: Option<&str>) -> crate::NestConfig {
    let mut config = crate::NestConfig::default();
    config.enable_nest = true;
    config.agent_id = "stock-agent".to_string();
    config.public_url = Some("http://localhost:6000".to_string());
    config.registry_url = registry_url.map(ToString::to_string);
    config.anthropic_api_key = Some("sk-test".to_string());
    config.heartbeat_interval = std::time::Duration::from_millis(20);
    config.registry_timeout = std::time::Duration::from_secs(2);
    config.forward_timeout = std::time::Duration::from_secs(2);
    config.registry_max_retries = 0;
    config.registry_retry_delay = std::time::Duration::from_millis(5);
    config
}

/// Poll `check` until it holds or `deadline` passes
pub async fn wait_until<F>(deadline: std::time::Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}
