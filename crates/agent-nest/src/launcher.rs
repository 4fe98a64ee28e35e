//! Process launcher
//!
//! Chooses between the plain HTTP API, the A2A adapter or both, runs them
//! until a shutdown is requested and tears everything down in order:
//! servers stop accepting, the adapter deregisters, tasks are awaited.

use crate::adapter::{NestAdapter, StatusReporter};
use crate::api::{self, ApiState};
use crate::audit::{AuditLog, TracingAuditLog};
use crate::config::NestConfig;
use crate::error::NestError;
use crate::server;
use agent_stock::AnalysisService;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Which servers a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Plain HTTP API only
    Standalone,
    /// A2A adapter only
    AgentOnly,
    /// Both, sharing one shutdown
    Dual,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::AgentOnly => "agent",
            Self::Dual => "dual",
        }
    }

    /// Mode implied by the configuration alone
    pub fn from_config(config: &NestConfig) -> Self {
        if !config.should_enable_nest() {
            Self::Standalone
        } else if config.enable_dual_mode {
            Self::Dual
        } else {
            Self::AgentOnly
        }
    }

    /// Honour an explicit request, falling back to standalone when the
    /// integration cannot run
    pub fn resolve(requested: Option<Self>, config: &NestConfig) -> Self {
        match requested {
            None => Self::from_config(config),
            Some(Self::Standalone) => Self::Standalone,
            Some(mode) => {
                if config.should_enable_nest() {
                    mode
                } else {
                    warn!(requested = %mode, "NEST integration unavailable, falling back to standalone mode");
                    Self::Standalone
                }
            }
        }
    }

    fn serves_api(self) -> bool {
        matches!(self, Self::Standalone | Self::Dual)
    }

    fn runs_agent(self) -> bool {
        matches!(self, Self::AgentOnly | Self::Dual)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clears the running flag however `run` exits
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs the selected servers until shutdown
pub struct Launcher {
    config: NestConfig,
    mode: RunMode,
    analysis: Arc<dyn AnalysisService>,
    audit: Arc<dyn AuditLog>,
    adapter: Option<Arc<NestAdapter>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    running: AtomicBool,
    api_addr: OnceLock<SocketAddr>,
    a2a_addr: OnceLock<SocketAddr>,
}

impl Launcher {
    pub fn new(config: NestConfig, analysis: Arc<dyn AnalysisService>, mode: RunMode) -> Self {
        Self::with_audit(config, analysis, mode, Arc::new(TracingAuditLog::new()))
    }

    pub fn with_audit(
        config: NestConfig,
        analysis: Arc<dyn AnalysisService>,
        mode: RunMode,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let adapter = mode.runs_agent().then(|| {
            Arc::new(NestAdapter::new(
                config.clone(),
                analysis.clone(),
                audit.clone(),
            ))
        });

        Self {
            config,
            mode,
            analysis,
            audit,
            adapter,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            api_addr: OnceLock::new(),
            a2a_addr: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn adapter(&self) -> Option<&Arc<NestAdapter>> {
        self.adapter.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the plain HTTP API is bound to, once running
    pub fn api_addr(&self) -> Option<SocketAddr> {
        self.api_addr.get().copied()
    }

    /// Address the A2A server is bound to, once running
    pub fn a2a_addr(&self) -> Option<SocketAddr> {
        self.a2a_addr.get().copied()
    }

    /// Token that triggers shutdown when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown; repeated calls are no-ops
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!(mode = %self.mode, "shutdown requested");
            self.shutdown.cancel();
        }
    }

    /// Run until shutdown or until a server exits
    ///
    /// A launcher runs once; later calls fail with `AlreadyRunning`.
    pub async fn run(&self) -> Result<(), NestError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NestError::AlreadyRunning("launcher"));
        }
        self.running.store(true, Ordering::SeqCst);
        let _guard = RunGuard(&self.running);

        info!(mode = %self.mode, "starting stock agent");
        let result = self.serve().await;
        match &result {
            Ok(()) => info!(mode = %self.mode, "stock agent stopped"),
            Err(e) => error!(mode = %self.mode, error = %e, "stock agent stopped with error"),
        }
        result
    }

    async fn serve(&self) -> Result<(), NestError> {
        let host = self.config.api_host.as_str();
        let api_listener = if self.mode.serves_api() {
            Some(bind(host, self.config.api_port, &self.api_addr).await?)
        } else {
            None
        };
        let a2a_listener = match &self.adapter {
            Some(adapter) => Some(bind(host, adapter.identity().port, &self.a2a_addr).await?),
            None => None,
        };

        let servers = self.shutdown.child_token();
        let mut tasks = JoinSet::new();

        if let Some(listener) = api_listener {
            let router = api::router(self.api_state());
            tasks.spawn(server::serve_on(listener, router, "HTTP API", servers.clone()));
        }

        if let (Some(adapter), Some(listener)) = (&self.adapter, a2a_listener) {
            if let Err(e) = adapter.start(true).await {
                servers.cancel();
                let _ = drain(&mut tasks).await;
                return Err(e);
            }
            let router = server::router(adapter.clone());
            tasks.spawn(server::serve_on(listener, router, "A2A", servers.clone()));
        }

        let first = tokio::select! {
            joined = tasks.join_next() => {
                warn!("a server exited before shutdown was requested");
                joined
            }
            () = self.shutdown.cancelled() => None,
        };

        servers.cancel();
        if let Some(adapter) = &self.adapter {
            adapter.stop().await;
        }

        let result = first.map_or(Ok(()), flatten);
        let rest = drain(&mut tasks).await;
        result.and(rest)
    }

    fn api_state(&self) -> ApiState {
        let nest = self
            .adapter
            .clone()
            .map(|adapter| adapter as Arc<dyn StatusReporter>);
        ApiState::new(
            self.mode.as_str(),
            self.analysis.clone(),
            self.audit.clone(),
            nest,
        )
    }
}

async fn bind(host: &str, port: u16, slot: &OnceLock<SocketAddr>) -> Result<TcpListener, NestError> {
    let listener = TcpListener::bind((host, port)).await?;
    let _ = slot.set(listener.local_addr()?);
    Ok(listener)
}

fn flatten(joined: Result<Result<(), NestError>, JoinError>) -> Result<(), NestError> {
    joined.map_err(|e| NestError::Internal(format!("server task failed: {e}")))?
}

/// Await every remaining task, keeping the first error
async fn drain(tasks: &mut JoinSet<Result<(), NestError>>) -> Result<(), NestError> {
    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = flatten(joined) {
            error!(error = %e, "server task failed");
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Resolve on Ctrl-C, or SIGTERM on Unix
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
