//! Discovery registry client
//!
//! Talks to a NANDA-style registry over HTTP:
//!
//! | Operation       | Request                         |
//! |-----------------|---------------------------------|
//! | register        | `POST /agents/register`         |
//! | update status   | `PUT /agents/{id}/status`       |
//! | lookup / info   | `GET /agents/{id}`              |
//! | list            | `GET /agents?capability=&domain=` |
//! | deregister      | `DELETE /agents/{id}`           |
//!
//! No public method returns an error. Failures become `false`, `None` or an
//! empty list, each paired with one audit event. The local registration
//! state tracks the outcome of the last register/deregister call.

use crate::audit::{AuditEvent, AuditLog, RegistryOperation};
use crate::error::TransportError;
use crate::retry::{Attempted, RetryPolicy};
use chrono::Utc;
use reqwest::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Default per-call timeout for registry requests
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Local view of this agent's registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    /// Registered, but the last status update failed
    Degraded,
    Deregistering,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unregistered => "unregistered",
            Self::Registering => "registering",
            Self::Registered => "registered",
            Self::Degraded => "degraded",
            Self::Deregistering => "deregistering",
        };
        f.write_str(label)
    }
}

/// HTTP client for the discovery registry
pub struct RegistryClient {
    registry_url: String,
    agent_id: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
    audit: Arc<dyn AuditLog>,

    /// Created on first use, dropped by `close`
    http_client: Mutex<Option<reqwest::Client>>,

    state: RwLock<RegistrationState>,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("registry_url", &self.registry_url)
            .field("agent_id", &self.agent_id)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Create a client for `agent_id` against the registry at `registry_url`
    pub fn new(
        registry_url: impl Into<String>,
        agent_id: impl Into<String>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
            agent_id: agent_id.into(),
            timeout: DEFAULT_REGISTRY_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            audit,
            http_client: Mutex::new(None),
            state: RwLock::new(RegistrationState::Unregistered),
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while the registry is believed to hold our record
    pub fn is_registered(&self) -> bool {
        matches!(
            self.state(),
            RegistrationState::Registered | RegistrationState::Degraded
        )
    }

    fn set_state(&self, state: RegistrationState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *guard != state {
            debug!(agent_id = %self.agent_id, from = %*guard, to = %state, "registration state change");
            *guard = state;
        }
    }

    /// Register this agent
    ///
    /// `metadata` is merged into the registration document; the protocol
    /// fields (`agent_id`, `agent_url`, `capabilities`, `status`,
    /// `registered_at`) cannot be overridden by it.
    pub async fn register(
        &self,
        agent_url: &str,
        capabilities: &[String],
        metadata: Map<String, Value>,
    ) -> bool {
        info!(agent_id = %self.agent_id, registry = %self.registry_url, "registering agent");
        self.set_state(RegistrationState::Registering);

        let mut document = metadata;
        document.insert("agent_id".into(), Value::from(self.agent_id.as_str()));
        document.insert("agent_url".into(), Value::from(agent_url));
        document.insert("capabilities".into(), Value::from(capabilities.to_vec()));
        document.insert("status".into(), Value::from("healthy"));
        document.insert("registered_at".into(), Value::from(Utc::now().to_rfc3339()));
        let body = Value::Object(document);

        let outcome = self
            .request(RegistryOperation::Register, Method::POST, "/agents/register", Some(&body), &[])
            .await;

        match outcome.result {
            Ok(_) => {
                self.set_state(RegistrationState::Registered);
                info!(
                    agent_id = %self.agent_id,
                    %agent_url,
                    capabilities = %capabilities.join(", "),
                    "registered with registry"
                );
                self.audit_registry(RegistryOperation::Register, true, outcome.attempts, Some(agent_url.to_string()));
                true
            }
            Err(e) => {
                self.set_state(RegistrationState::Unregistered);
                warn!(agent_id = %self.agent_id, error = %e, "registration failed");
                self.audit_registry(RegistryOperation::Register, false, outcome.attempts, Some(e.to_string()));
                false
            }
        }
    }

    /// Push a status document for this agent
    pub async fn update_status(&self, status: &str, metadata: Option<Map<String, Value>>) -> bool {
        let mut document = metadata.unwrap_or_default();
        document.insert("agent_id".into(), Value::from(self.agent_id.as_str()));
        document.insert("status".into(), Value::from(status));
        document.insert("last_updated".into(), Value::from(Utc::now().to_rfc3339()));
        let body = Value::Object(document);

        let path = format!("/agents/{}/status", encode_segment(&self.agent_id));
        let outcome = self
            .request(RegistryOperation::UpdateStatus, Method::PUT, &path, Some(&body), &[])
            .await;

        match outcome.result {
            Ok(_) => {
                if self.state() == RegistrationState::Degraded {
                    self.set_state(RegistrationState::Registered);
                }
                debug!(agent_id = %self.agent_id, %status, "status updated");
                self.audit_registry(RegistryOperation::UpdateStatus, true, outcome.attempts, Some(status.to_string()));
                true
            }
            Err(e) => {
                if self.state() == RegistrationState::Registered {
                    self.set_state(RegistrationState::Degraded);
                }
                warn!(agent_id = %self.agent_id, error = %e, "status update failed");
                self.audit_registry(RegistryOperation::UpdateStatus, false, outcome.attempts, Some(e.to_string()));
                false
            }
        }
    }

    /// Liveness ping: a `healthy` status update
    pub async fn heartbeat(&self) -> bool {
        self.update_status("healthy", None).await
    }

    /// URL of `target_id`, if the registry knows it
    pub async fn lookup_agent(&self, target_id: &str) -> Option<String> {
        let record = self.fetch_agent(RegistryOperation::Lookup, target_id).await;
        let url = record
            .as_ref()
            .and_then(|r| r.get("agent_url"))
            .and_then(Value::as_str)
            .map(ToString::to_string);

        match &url {
            Some(url) => info!(target = %target_id, %url, "found agent"),
            None => warn!(target = %target_id, "agent not found in registry"),
        }
        url
    }

    /// Full registry record for `target_id`
    pub async fn get_agent_info(&self, target_id: &str) -> Option<Value> {
        self.fetch_agent(RegistryOperation::GetInfo, target_id).await
    }

    async fn fetch_agent(&self, operation: RegistryOperation, target_id: &str) -> Option<Value> {
        let path = format!("/agents/{}", encode_segment(target_id));
        let outcome = self.request(operation, Method::GET, &path, None, &[]).await;

        match outcome.result {
            Ok(Some(record)) if record.is_object() => {
                let found = operation != RegistryOperation::Lookup || record.get("agent_url").is_some_and(Value::is_string);
                let detail = if found {
                    format!("target={target_id}")
                } else {
                    format!("target={target_id}: record has no agent_url")
                };
                self.audit_registry(operation, found, outcome.attempts, Some(detail));
                Some(record)
            }
            Ok(_) => {
                self.audit_registry(operation, false, outcome.attempts, Some(format!("target={target_id}: empty record")));
                None
            }
            Err(e) => {
                self.audit_registry(operation, false, outcome.attempts, Some(format!("target={target_id}: {e}")));
                None
            }
        }
    }

    /// Agents known to the registry, optionally filtered
    ///
    /// Accepts a bare JSON array or `{"agents": [...]}`.
    pub async fn list_agents(&self, capability: Option<&str>, domain: Option<&str>) -> Vec<Value> {
        let mut query = Vec::new();
        if let Some(capability) = capability {
            query.push(("capability", capability));
        }
        if let Some(domain) = domain {
            query.push(("domain", domain));
        }

        let outcome = self
            .request(RegistryOperation::List, Method::GET, "/agents", None, &query)
            .await;

        let agents = match outcome.result {
            Ok(Some(Value::Array(agents))) => Some(agents),
            Ok(Some(Value::Object(mut body))) => match body.remove("agents") {
                Some(Value::Array(agents)) => Some(agents),
                _ => None,
            },
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "listing agents failed");
                None
            }
        };

        match agents {
            Some(agents) => {
                info!(count = agents.len(), "retrieved agents from registry");
                self.audit_registry(RegistryOperation::List, true, outcome.attempts, Some(format!("count={}", agents.len())));
                agents
            }
            None => {
                self.audit_registry(RegistryOperation::List, false, outcome.attempts, None);
                Vec::new()
            }
        }
    }

    /// Remove this agent from the registry
    ///
    /// Returns `true` without a request when not registered. A 404 counts as
    /// success; any other failure leaves the client registered.
    pub async fn deregister(&self) -> bool {
        let previous = self.state();
        if !matches!(previous, RegistrationState::Registered | RegistrationState::Degraded) {
            debug!(agent_id = %self.agent_id, "not registered, skipping deregistration");
            return true;
        }

        info!(agent_id = %self.agent_id, "deregistering agent");
        self.set_state(RegistrationState::Deregistering);

        let path = format!("/agents/{}", encode_segment(&self.agent_id));
        let outcome = self
            .request(RegistryOperation::Deregister, Method::DELETE, &path, None, &[])
            .await;

        let result = match outcome.result {
            Ok(_) | Err(TransportError::Status { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.set_state(RegistrationState::Unregistered);
                info!(agent_id = %self.agent_id, "deregistered");
                self.audit_registry(RegistryOperation::Deregister, true, outcome.attempts, None);
                true
            }
            Err(e) => {
                self.set_state(previous);
                warn!(agent_id = %self.agent_id, error = %e, "deregistration failed");
                self.audit_registry(RegistryOperation::Deregister, false, outcome.attempts, Some(e.to_string()));
                false
            }
        }
    }

    /// Drop the pooled HTTP client; the next call creates a fresh one
    pub async fn close(&self) {
        if self.http_client.lock().await.take().is_some() {
            debug!(agent_id = %self.agent_id, "closed registry client");
        }
    }

    async fn http(&self) -> Result<reqwest::Client, TransportError> {
        let mut guard = self.http_client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to create HTTP client: {e}")))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn request(
        &self,
        operation: RegistryOperation,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Attempted<Option<Value>> {
        let name = format!("{} {}", operation.as_str(), path);
        self.retry_policy
            .execute(&name, || self.send_once(method.clone(), path, body, query))
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, TransportError> {
        let mut url = Url::parse(&format!("{}{}", self.registry_url, path))
            .map_err(|e| TransportError::Connection(format!("invalid registry URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let client = self.http().await?;
        let mut request = client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        if !status.is_success() {
            debug!(%method, %path, status = status.as_u16(), "registry request rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        // any 2xx is success; only lookups and listings need a usable body
        if text.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(%method, %path, error = %e, "registry reply is not JSON, ignoring body");
                Ok(None)
            }
        }
    }

    fn audit_registry(
        &self,
        operation: RegistryOperation,
        success: bool,
        attempts: u32,
        detail: Option<String>,
    ) {
        self.audit.record(AuditEvent::Registry {
            operation,
            agent_id: self.agent_id.clone(),
            success,
            attempts,
            detail,
        });
    }
}

/// Percent-encode one path segment
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryAuditLog, closed_port_url, spawn_registry, spawn_router};
    use axum::{Router, http::StatusCode, routing::any};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn client(url: &str, audit: &Arc<MemoryAuditLog>) -> RegistryClient {
        RegistryClient::new(url, "stock-agent", audit.clone())
            .with_timeout(Duration::from_secs(2))
            .with_retry_policy(RetryPolicy::no_retry())
    }

    fn metadata() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("agent_name".into(), json!("NASDAQ Stock Agent"));
        m.insert("agent_id".into(), json!("spoofed"));
        m
    }

    #[tokio::test]
    async fn test_register_lookup_and_deregister() {
        let registry = spawn_registry().await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert_eq!(client.state(), RegistrationState::Unregistered);
        assert!(
            client
                .register("http://localhost:6000", &["stock_analysis".to_string()], metadata())
                .await
        );
        assert!(client.is_registered());

        let stored = registry.agent("stock-agent").unwrap();
        assert_eq!(stored["agent_id"], "stock-agent");
        assert_eq!(stored["agent_name"], "NASDAQ Stock Agent");
        assert_eq!(stored["status"], "healthy");
        assert_eq!(stored["capabilities"][0], "stock_analysis");
        assert!(stored["registered_at"].is_string());

        assert_eq!(
            client.lookup_agent("stock-agent").await.as_deref(),
            Some("http://localhost:6000")
        );
        assert!(client.heartbeat().await);
        assert_eq!(registry.agent("stock-agent").unwrap()["status"], "healthy");

        assert!(client.deregister().await);
        assert!(!client.is_registered());
        assert!(registry.agent("stock-agent").is_none());
    }

    #[tokio::test]
    async fn test_lookup_404_is_none() {
        let registry = spawn_registry().await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert_eq!(client.lookup_agent("nobody").await, None);
        assert_eq!(client.get_agent_info("nobody").await, None);

        let events = audit.registry_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|(_, success, attempts)| !success && *attempts == 1));
    }

    #[tokio::test]
    async fn test_lookup_without_agent_url_is_none() {
        let registry = spawn_registry().await;
        registry.insert("bare", json!({"agent_id": "bare"}));
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert_eq!(client.lookup_agent("bare").await, None);
        assert!(client.get_agent_info("bare").await.is_some());
    }

    #[tokio::test]
    async fn test_register_connection_error_returns_false() {
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&closed_port_url().await, &audit);

        assert!(!client.register("http://localhost:6000", &[], Map::new()).await);
        assert_eq!(client.state(), RegistrationState::Unregistered);
        assert_eq!(
            audit.registry_events(),
            vec![(RegistryOperation::Register, false, 1)]
        );
    }

    #[tokio::test]
    async fn test_register_timeout_returns_false() {
        let router = Router::new().route(
            "/agents/register",
            any(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let (url, _server) = spawn_router(router).await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = RegistryClient::new(url, "stock-agent", audit.clone())
            .with_timeout(Duration::from_millis(100))
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(10)));

        assert!(!client.register("http://localhost:6000", &[], Map::new()).await);
        assert_eq!(
            audit.registry_events(),
            vec![(RegistryOperation::Register, false, 2)]
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_with_backoff() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let router = Router::new().route(
            "/agents/register",
            any(move || {
                let hits = hits_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, "registry down")
                }
            }),
        );
        let (url, _server) = spawn_router(router).await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = RegistryClient::new(url, "stock-agent", audit.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)));

        let start = Instant::now();
        assert!(!client.register("http://localhost:6000", &[], Map::new()).await);

        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(start.elapsed() >= Duration::from_millis(70));
        assert_eq!(
            audit.registry_events(),
            vec![(RegistryOperation::Register, false, 4)]
        );
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let router = Router::new().route(
            "/agents/register",
            any(move || {
                let hits = hits_clone.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let (url, _server) = spawn_router(router).await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = RegistryClient::new(url, "stock-agent", audit)
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)));

        assert!(!client.register("http://localhost:6000", &[], Map::new()).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_plain_text_success_counts_as_success() {
        let router = Router::new()
            .route("/agents/register", any(|| async { (StatusCode::OK, "OK") }))
            .route("/agents/{id}/status", any(|| async { (StatusCode::OK, "updated") }))
            .route("/agents/{id}", any(|| async { (StatusCode::OK, "gone") }))
            .route("/agents", any(|| async { (StatusCode::OK, "none") }));
        let (url, _server) = spawn_router(router).await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&url, &audit);

        assert!(client.register("http://localhost:6000", &[], Map::new()).await);
        assert_eq!(client.state(), RegistrationState::Registered);
        assert!(client.heartbeat().await);
        assert_eq!(client.lookup_agent("advisor").await, None);
        assert!(client.list_agents(None, None).await.is_empty());
        assert!(client.deregister().await);
        assert_eq!(client.state(), RegistrationState::Unregistered);

        assert_eq!(
            audit.registry_events(),
            vec![
                (RegistryOperation::Register, true, 1),
                (RegistryOperation::UpdateStatus, true, 1),
                (RegistryOperation::Lookup, false, 1),
                (RegistryOperation::List, false, 1),
                (RegistryOperation::Deregister, true, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_heartbeat_degrades_then_recovers() {
        let registry = spawn_registry().await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert!(client.register("http://localhost:6000", &[], Map::new()).await);

        registry.fail_with(Some(503));
        assert!(!client.heartbeat().await);
        assert_eq!(client.state(), RegistrationState::Degraded);
        assert!(client.is_registered());

        registry.fail_with(None);
        assert!(client.heartbeat().await);
        assert_eq!(client.state(), RegistrationState::Registered);
    }

    #[tokio::test]
    async fn test_deregister_when_never_registered_is_noop() {
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&closed_port_url().await, &audit);

        assert!(client.deregister().await);
        assert!(audit.registry_events().is_empty());
    }

    #[tokio::test]
    async fn test_failed_deregister_keeps_registration() {
        let registry = spawn_registry().await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);
        assert!(client.register("http://localhost:6000", &[], Map::new()).await);

        registry.fail_with(Some(500));
        assert!(!client.deregister().await);
        assert_eq!(client.state(), RegistrationState::Registered);

        registry.fail_with(None);
        registry.remove("stock-agent");
        // registry already forgot us: 404 still counts as deregistered
        assert!(client.deregister().await);
        assert_eq!(client.state(), RegistrationState::Unregistered);
    }

    #[tokio::test]
    async fn test_list_agents_filters_and_shapes() {
        let registry = spawn_registry().await;
        registry.insert(
            "advisor",
            json!({"agent_id": "advisor", "agent_url": "http://a", "capabilities": ["advice"], "domain": "finance"}),
        );
        registry.insert(
            "weather",
            json!({"agent_id": "weather", "agent_url": "http://w", "capabilities": ["forecast"], "domain": "weather"}),
        );
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert_eq!(client.list_agents(None, None).await.len(), 2);
        let advice = client.list_agents(Some("advice"), None).await;
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0]["agent_id"], "advisor");
        assert_eq!(client.list_agents(None, Some("weather")).await.len(), 1);

        let bare_array = Router::new().route("/agents", any(|| async { axum::Json(json!([{"agent_id": "x"}])) }));
        let (url, _server) = spawn_router(bare_array).await;
        assert_eq!(RegistryClient::new(url, "a", audit.clone()).list_agents(None, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_agents_error_is_empty() {
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&closed_port_url().await, &audit);
        assert!(client.list_agents(Some("x"), None).await.is_empty());
    }

    #[tokio::test]
    async fn test_close_then_reuse() {
        let registry = spawn_registry().await;
        let audit = Arc::new(MemoryAuditLog::default());
        let client = client(&registry.url, &audit);

        assert!(client.register("http://localhost:6000", &[], Map::new()).await);
        client.close().await;
        assert!(client.heartbeat().await);
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(encode_segment("financial-advisor"), "financial-advisor");
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment("a+b"), "a%2Bb");
    }
}
