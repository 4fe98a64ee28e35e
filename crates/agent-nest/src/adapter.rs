//! Adapter lifecycle
//!
//! [`NestAdapter`] owns the bridge and the optional registry client. It
//! registers on start, keeps the registry informed with a heartbeat task and
//! deregisters on stop. Other components query it through the narrow
//! [`StatusReporter`] trait instead of holding the adapter itself.

use crate::audit::AuditLog;
use crate::bridge::{AgentBridge, BridgeHealth};
use crate::config::NestConfig;
use crate::error::NestError;
use crate::registry::RegistryClient;
use agent_core::{AgentIdentity, MessageHandler};
use agent_stock::AnalysisService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Live counters kept by the adapter and its heartbeat task
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStatus {
    pub running: bool,
    pub registered: bool,
    pub heartbeats_sent: u64,
    pub heartbeat_failures: u64,
    pub reregistrations: u64,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Registry part of an [`AdapterStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatus {
    pub configured: bool,
    pub registered: bool,
    pub state: Option<String>,
    pub url: Option<String>,
}

/// Snapshot of the adapter for external reporting
#[derive(Debug, Clone, Serialize)]
pub struct AdapterStatus {
    pub agent_id: String,
    /// `running` or `stopped`
    pub status: &'static str,
    pub port: u16,
    pub public_url: String,
    pub bridge_health: BridgeHealth,
    pub registry: RegistryStatus,
    pub heartbeat: AgentStatus,
    pub agent_config: Value,
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of a running integration
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Current status as a JSON document
    async fn status_snapshot(&self) -> Value;

    /// Administrative configuration document
    fn agent_config(&self) -> Value;
}

/// Registration parameters replayed by the heartbeat task
#[derive(Clone)]
struct Registration {
    agent_url: String,
    capabilities: Vec<String>,
    metadata: Map<String, Value>,
}

/// Runs the A2A side of the agent
pub struct NestAdapter {
    config: NestConfig,
    identity: Arc<AgentIdentity>,
    bridge: Arc<AgentBridge>,
    registry: Option<Arc<RegistryClient>>,
    running: Arc<AtomicBool>,
    /// Cancelled by `stop`; replaced on every `start`
    cancel: RwLock<CancellationToken>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    status: Arc<RwLock<AgentStatus>>,
}

impl NestAdapter {
    /// Build the bridge and, when a registry URL is configured, the registry client
    pub fn new(
        config: NestConfig,
        analysis: Arc<dyn AnalysisService>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let identity = Arc::new(config.identity());

        let registry = config.registry_url.as_ref().map(|url| {
            Arc::new(
                RegistryClient::new(url.clone(), identity.agent_id.clone(), audit.clone())
                    .with_timeout(config.registry_timeout)
                    .with_retry_policy(config.retry_policy()),
            )
        });
        if registry.is_none() {
            info!(agent_id = %identity.agent_id, "no registry URL configured, peer discovery disabled");
        }

        let bridge = Arc::new(
            AgentBridge::new(identity.clone(), analysis, registry.clone(), audit)
                .with_forward_timeout(config.forward_timeout),
        );

        Self {
            config,
            identity,
            bridge,
            registry,
            running: Arc::new(AtomicBool::new(false)),
            cancel: RwLock::new(CancellationToken::new()),
            heartbeat: Mutex::new(None),
            status: Arc::new(RwLock::new(AgentStatus::default())),
        }
    }

    pub fn identity(&self) -> &Arc<AgentIdentity> {
        &self.identity
    }

    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<AgentBridge> {
        &self.bridge
    }

    pub fn registry(&self) -> Option<&Arc<RegistryClient>> {
        self.registry.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the adapter
    ///
    /// With `register` and a configured registry this registers the agent
    /// and launches the heartbeat task. A failed registration is logged and
    /// the adapter keeps running without it.
    pub async fn start(&self, register: bool) -> Result<(), NestError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(NestError::AlreadyRunning("NEST adapter"));
        }
        let cancel = CancellationToken::new();
        *self.cancel.write().unwrap_or_else(PoisonError::into_inner) = cancel.clone();
        update(&self.status, |s| {
            s.running = true;
            s.last_error = None;
        });
        info!(
            agent_id = %self.identity.agent_id,
            port = self.identity.port,
            public_url = %self.identity.public_url,
            "starting NEST adapter"
        );

        let Some(registry) = self.registry.clone() else {
            return Ok(());
        };
        if !register {
            debug!("registration not requested");
            return Ok(());
        }

        let registration = Registration {
            agent_url: self.identity.public_url.clone(),
            capabilities: self.identity.capability_list(),
            metadata: self.config.registration_metadata(),
        };
        let registered = registry
            .register(
                &registration.agent_url,
                &registration.capabilities,
                registration.metadata.clone(),
            )
            .await;
        update(&self.status, |s| s.registered = registered);
        if !registered {
            warn!(
                agent_id = %self.identity.agent_id,
                "registration failed, continuing without peer discovery"
            );
            update(&self.status, |s| {
                s.last_error = Some("registration failed".to_string());
            });
        }

        // `stop` cancels before taking this lock, so a stop that raced the
        // registration is seen here and no heartbeat outlives it
        let mut slot = self.heartbeat.lock().await;
        if cancel.is_cancelled() {
            drop(slot);
            info!(agent_id = %self.identity.agent_id, "stopped during registration, withdrawing it");
            if !registry.deregister().await {
                warn!(agent_id = %self.identity.agent_id, "deregistration failed");
            }
            let registered = registry.is_registered();
            update(&self.status, |s| s.registered = registered);
            return Ok(());
        }

        *slot = Some(tokio::spawn(heartbeat_loop(
            self.bridge.clone(),
            registry,
            self.status.clone(),
            registration,
            HeartbeatSettings {
                interval: self.config.heartbeat_interval,
                reregister_attempts: self.config.reregister_attempts,
            },
            self.running.clone(),
            cancel,
        )));

        Ok(())
    }

    /// Stop the heartbeat, deregister and release connections
    ///
    /// Calling this on a stopped adapter only logs a warning.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!(agent_id = %self.identity.agent_id, "NEST adapter is not running");
            return;
        }
        info!(agent_id = %self.identity.agent_id, "stopping NEST adapter");
        self.cancel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();

        let heartbeat = self.heartbeat.lock().await.take();
        if let Some(handle) = heartbeat {
            if let Err(e) = handle.await {
                error!(error = %e, "heartbeat task ended abnormally");
            }
        }

        if let Some(registry) = &self.registry {
            if !registry.deregister().await {
                warn!(agent_id = %self.identity.agent_id, "deregistration failed");
            }
        }
        self.bridge.close().await;

        let registered = self.registry.as_ref().is_some_and(|r| r.is_registered());
        update(&self.status, |s| {
            s.running = false;
            s.registered = registered;
        });
        info!(agent_id = %self.identity.agent_id, "NEST adapter stopped");
    }

    /// Full status snapshot: bridge health, registry link and identity
    pub async fn status(&self) -> AdapterStatus {
        let bridge_health = self.bridge.health().await;
        let running = self.is_running();
        let heartbeat = self
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        AdapterStatus {
            agent_id: self.identity.agent_id.clone(),
            status: if running { "running" } else { "stopped" },
            port: self.identity.port,
            public_url: self.identity.public_url.clone(),
            registry: RegistryStatus {
                configured: self.registry.is_some(),
                registered: self.registry.as_ref().is_some_and(|r| r.is_registered()),
                state: self.registry.as_ref().map(|r| r.state().to_string()),
                url: self.config.registry_url.clone(),
            },
            agent_config: self.config.peer_document(&bridge_health.status.to_string()),
            bridge_health,
            heartbeat,
            timestamp: Utc::now(),
        }
    }

    /// Administrative document, secrets included
    pub fn agent_config(&self) -> Value {
        let status = if self.is_running() { "healthy" } else { "stopped" };
        self.config.admin_document(status)
    }
}

impl Drop for NestAdapter {
    fn drop(&mut self) {
        self.cancel
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

#[async_trait]
impl MessageHandler for NestAdapter {
    async fn handle(&self, text: &str, conversation_id: &str) -> String {
        self.bridge
            .process_query(text, conversation_id, None)
            .await
            .content
            .text
    }

    fn agent_id(&self) -> &str {
        &self.identity.agent_id
    }
}

#[async_trait]
impl StatusReporter for NestAdapter {
    async fn status_snapshot(&self) -> Value {
        serde_json::to_value(self.status().await).unwrap_or_else(|e| {
            json!({
                "agent_id": self.identity.agent_id,
                "status": "error",
                "error": e.to_string(),
                "timestamp": Utc::now(),
            })
        })
    }

    fn agent_config(&self) -> Value {
        NestAdapter::agent_config(self)
    }
}

fn update(status: &RwLock<AgentStatus>, f: impl FnOnce(&mut AgentStatus)) {
    f(&mut status.write().unwrap_or_else(PoisonError::into_inner));
}

#[derive(Debug, Clone, Copy)]
struct HeartbeatSettings {
    interval: Duration,
    reregister_attempts: u32,
}

async fn heartbeat_loop(
    bridge: Arc<AgentBridge>,
    registry: Arc<RegistryClient>,
    status: Arc<RwLock<AgentStatus>>,
    registration: Registration,
    settings: HeartbeatSettings,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    info!(interval_ms = settings.interval.as_millis() as u64, "starting registry heartbeat");
    let mut reregister_left = settings.reregister_attempts;

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = beat(&bridge, &registry, &status, &registration, &mut reregister_left) => {}
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(settings.interval) => {}
        }
    }

    debug!("registry heartbeat stopped");
}

async fn beat(
    bridge: &AgentBridge,
    registry: &RegistryClient,
    status: &RwLock<AgentStatus>,
    registration: &Registration,
    reregister_left: &mut u32,
) {
    if !registry.is_registered() && *reregister_left > 0 {
        *reregister_left -= 1;
        info!(remaining = *reregister_left, "retrying registration");
        let registered = registry
            .register(
                &registration.agent_url,
                &registration.capabilities,
                registration.metadata.clone(),
            )
            .await;
        update(status, |s| {
            s.registered = registered;
            if registered {
                s.reregistrations += 1;
                s.last_error = None;
            }
        });
        return;
    }

    let health = bridge.health().await;
    let label = health.status.to_string();
    let mut metadata = Map::new();
    metadata.insert("last_heartbeat".into(), json!(Utc::now().to_rfc3339()));
    metadata.insert(
        "health".into(),
        serde_json::to_value(&health).unwrap_or(Value::Null),
    );

    let ok = registry.update_status(&label, Some(metadata)).await;
    let registered = registry.is_registered();
    update(status, |s| {
        s.registered = registered;
        if ok {
            s.heartbeats_sent += 1;
            s.last_heartbeat_at = Some(Utc::now());
            s.last_error = None;
        } else {
            s.heartbeat_failures += 1;
            s.last_error = Some("heartbeat failed".to_string());
        }
    });
    if ok {
        debug!(status = %label, "sent heartbeat");
    } else {
        warn!(status = %label, "heartbeat failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        MemoryAuditLog, healthy_analysis, nest_config, spawn_registry, wait_until,
    };
    use tokio_test::{assert_err, assert_ok};

    fn adapter(config: NestConfig) -> (NestAdapter, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::default());
        let adapter = NestAdapter::new(config, Arc::new(healthy_analysis()), audit.clone());
        (adapter, audit)
    }

    #[tokio::test]
    async fn test_start_is_guarded_and_stop_is_idempotent() {
        let (adapter, _) = adapter(nest_config(None));

        assert_ok!(adapter.start(true).await);
        assert!(adapter.is_running());
        let err = assert_err!(adapter.start(true).await);
        assert!(matches!(err, NestError::AlreadyRunning(_)));

        adapter.stop().await;
        assert!(!adapter.is_running());
        adapter.stop().await;
        assert!(!adapter.is_running());
    }

    #[tokio::test]
    async fn test_without_registry_no_heartbeat_runs() {
        let (adapter, audit) = adapter(nest_config(None));
        assert_ok!(adapter.start(true).await);

        assert!(adapter.heartbeat.lock().await.is_none());
        assert!(adapter.registry().is_none());
        adapter.stop().await;
        assert!(audit.registry_events().is_empty());
    }

    #[tokio::test]
    async fn test_register_heartbeat_and_deregister() {
        let registry = spawn_registry().await;
        let (adapter, _) = adapter(nest_config(Some(&registry.url)));

        assert_ok!(adapter.start(true).await);
        let record = registry.agent("stock-agent").unwrap();
        assert_eq!(record["agent_url"], "http://localhost:6000");
        assert_eq!(record["agent_name"], "NASDAQ Stock Agent");
        assert_eq!(record["capabilities"].as_array().unwrap().len(), 5);

        let beat = wait_until(Duration::from_secs(2), || {
            registry
                .agent("stock-agent")
                .is_some_and(|r| r.get("last_updated").is_some())
        })
        .await;
        assert!(beat, "heartbeat never reached the registry");
        assert!(wait_until(Duration::from_secs(2), || {
            adapter.status.read().unwrap().heartbeats_sent > 0
        })
        .await);

        adapter.stop().await;
        assert!(registry.agent("stock-agent").is_none());
        assert!(adapter.heartbeat.lock().await.is_none());
        assert!(!adapter.registry().unwrap().is_registered());
    }

    #[tokio::test]
    async fn test_skip_registration_when_not_requested() {
        let registry = spawn_registry().await;
        let (adapter, _) = adapter(nest_config(Some(&registry.url)));

        assert_ok!(adapter.start(false).await);
        assert!(registry.agent("stock-agent").is_none());
        assert!(adapter.heartbeat.lock().await.is_none());
        adapter.stop().await;
    }

    #[tokio::test]
    async fn test_failed_registration_keeps_running() {
        let registry = spawn_registry().await;
        registry.fail_with(Some(500));
        let (adapter, _) = adapter(nest_config(Some(&registry.url)));

        assert_ok!(adapter.start(true).await);
        assert!(adapter.is_running());
        let status = adapter.status().await;
        assert!(status.registry.configured);
        assert!(!status.registry.registered);
        assert!(status.heartbeat.last_error.is_some());
        assert!(!status.heartbeat.registered);

        adapter.stop().await;
    }

    #[tokio::test]
    async fn test_bounded_reregistration() {
        let registry = spawn_registry().await;
        registry.fail_with(Some(503));
        let mut config = nest_config(Some(&registry.url));
        config.reregister_attempts = 50;
        let (adapter, _) = adapter(config);

        assert_ok!(adapter.start(true).await);
        assert!(!adapter.registry().unwrap().is_registered());

        registry.fail_with(None);
        let recovered = wait_until(Duration::from_secs(3), || {
            registry.agent("stock-agent").is_some()
        })
        .await;
        assert!(recovered, "registration was never retried");
        assert!(wait_until(Duration::from_secs(2), || {
            adapter.status.read().unwrap().reregistrations == 1
        })
        .await);

        adapter.stop().await;
    }

    #[tokio::test]
    async fn test_stop_during_registration_leaves_nothing_behind() {
        let registry = spawn_registry().await;
        registry.delay_register(Duration::from_millis(300));
        let (adapter, _) = adapter(nest_config(Some(&registry.url)));
        let adapter = Arc::new(adapter);

        let starting = tokio::spawn({
            let adapter = adapter.clone();
            async move { adapter.start(true).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        adapter.stop().await;
        assert_ok!(starting.await.unwrap());

        assert!(!adapter.is_running());
        assert!(adapter.heartbeat.lock().await.is_none());
        assert!(!adapter.registry().unwrap().is_registered());
        assert!(registry.agent("stock-agent").is_none());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = adapter.status.read().unwrap().clone();
        assert_eq!(status.heartbeats_sent, 0);
        assert!(!status.registered);
        assert!(registry.agent("stock-agent").is_none());
    }

    #[tokio::test]
    async fn test_heartbeat_loop_exits_when_running_flag_clears() {
        let registry = spawn_registry().await;
        let (adapter, _) = adapter(nest_config(Some(&registry.url)));
        assert_ok!(adapter.start(true).await);

        adapter.running.store(false, Ordering::SeqCst);
        let handle = adapter.heartbeat.lock().await.take().unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("heartbeat loop kept running")
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_handler_returns_reply_text() {
        let (adapter, _) = adapter(nest_config(None));
        let handler: &dyn MessageHandler = &adapter;

        assert_eq!(handler.agent_id(), "stock-agent");
        let text = handler.handle("analyze AAPL", "conv-9").await;
        assert!(text.contains("AAPL"));
        assert!(text.contains("BUY"));
    }

    #[tokio::test]
    async fn test_status_snapshot_and_agent_config() {
        let (adapter, _) = adapter(nest_config(None));
        assert_ok!(adapter.start(true).await);

        let reporter: &dyn StatusReporter = &adapter;
        let snapshot = reporter.status_snapshot().await;
        assert_eq!(snapshot["agent_id"], "stock-agent");
        assert_eq!(snapshot["status"], "running");
        assert_eq!(snapshot["registry"]["configured"], false);
        assert_eq!(snapshot["bridge_health"]["status"], "healthy");
        assert!(snapshot["agent_config"].get("anthropic_api_key").is_none());

        let admin = adapter.agent_config();
        assert_eq!(admin["anthropic_api_key"], "***");
        assert_eq!(admin["status"], "healthy");

        adapter.stop().await;
        assert_eq!(adapter.status().await.status, "stopped");
    }
}
