//! Per-message orchestration
//!
//! For each inbound query the bridge either forwards it to a peer named by an
//! `@agent-id` prefix or extracts a ticker and asks the analysis service. The
//! result, good or bad, always comes back as a well-formed [`A2AMessage`].

use crate::audit::{AuditEvent, AuditLog, Outcome};
use crate::codec::{
    A2AMessage, ErrorCode, ReplyContext, format_analysis, format_error, new_conversation_id,
    parse_inbound,
};
use crate::error::{NestError, TransportError};
use crate::query::{format_ticker_error, parse_intent};
use crate::registry::RegistryClient;
use agent_core::AgentIdentity;
use agent_stock::{AnalysisService, HealthStatus, ServiceHealth};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Default timeout for a forwarded message
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@([\w-]+)\s+(.+)$").expect("static mention pattern must compile")
});

/// Split an `@agent-id rest` prefix off a message
///
/// Returns `(None, text)` unchanged when there is no mention.
pub fn parse_agent_mention(text: &str) -> (Option<String>, String) {
    match MENTION.captures(text.trim()) {
        Some(caps) => (Some(caps[1].to_string()), caps[2].to_string()),
        None => (None, text.to_string()),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Health snapshot of the bridge and what it depends on
#[derive(Debug, Clone, Serialize)]
pub struct BridgeHealth {
    pub agent_id: String,
    pub status: HealthStatus,
    pub analysis_service: ServiceHealth,
    pub registry_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_connected: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

/// A2A bridge for the stock agent
pub struct AgentBridge {
    identity: Arc<AgentIdentity>,
    analysis: Arc<dyn AnalysisService>,
    registry: Option<Arc<RegistryClient>>,
    audit: Arc<dyn AuditLog>,
    forward_timeout: Duration,

    /// Client for peer forwards, created on first use
    http_client: Mutex<Option<reqwest::Client>>,
}

impl AgentBridge {
    pub fn new(
        identity: Arc<AgentIdentity>,
        analysis: Arc<dyn AnalysisService>,
        registry: Option<Arc<RegistryClient>>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        info!(agent_id = %identity.agent_id, registry = registry.is_some(), "initialized agent bridge");
        Self {
            identity,
            analysis,
            registry,
            audit,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
            http_client: Mutex::new(None),
        }
    }

    /// Set the timeout for forwarded messages
    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.identity.agent_id
    }

    pub fn registry(&self) -> Option<&Arc<RegistryClient>> {
        self.registry.as_ref()
    }

    /// Handle a raw inbound wire message
    pub async fn handle_message(&self, raw: &Value) -> A2AMessage {
        if !raw.is_object() {
            return self.reject_malformed("expected a JSON object");
        }

        let parsed = parse_inbound(raw);
        info!(
            from_agent_id = parsed.from_agent_id.as_deref().unwrap_or("unknown"),
            conversation_id = %parsed.conversation_id,
            "received A2A message"
        );

        let conversation_id = if parsed.conversation_id.is_empty() {
            new_conversation_id()
        } else {
            parsed.conversation_id
        };
        let ctx = ReplyContext::new(self.agent_id(), conversation_id).with_parent(parsed.message_id);
        self.process(&parsed.query, ctx, parsed.from_agent_id).await
    }

    /// Reply to a message that could not be decoded at all
    pub fn reject_malformed(&self, reason: &str) -> A2AMessage {
        warn!(%reason, "rejecting malformed A2A message");
        let ctx = ReplyContext::new(self.agent_id(), "unknown");
        let message = format!("Failed to process message: {reason}");

        self.audit.record(AuditEvent::Incoming {
            agent_id: self.agent_id().to_string(),
            conversation_id: ctx.conversation_id.clone(),
            from_agent_id: None,
            query: String::new(),
        });
        self.audit.record(AuditEvent::Completed {
            agent_id: self.agent_id().to_string(),
            conversation_id: ctx.conversation_id.clone(),
            outcome: Outcome::Error {
                code: ErrorCode::MessageProcessingError,
                message: message.clone(),
            },
            elapsed_ms: 0,
        });

        format_error(&message, &ctx, Some(ErrorCode::MessageProcessingError), &[])
    }

    /// Process one query of a conversation
    pub async fn process_query(
        &self,
        query: &str,
        conversation_id: &str,
        parent_message_id: Option<String>,
    ) -> A2AMessage {
        let ctx = ReplyContext::new(self.agent_id(), conversation_id).with_parent(parent_message_id);
        self.process(query, ctx, None).await
    }

    async fn process(
        &self,
        query: &str,
        ctx: ReplyContext,
        from_agent_id: Option<String>,
    ) -> A2AMessage {
        let start = Instant::now();
        self.audit.record(AuditEvent::Incoming {
            agent_id: self.agent_id().to_string(),
            conversation_id: ctx.conversation_id.clone(),
            from_agent_id,
            query: query.to_string(),
        });

        let dispatched = AssertUnwindSafe(self.dispatch(query, &ctx))
            .catch_unwind()
            .await;

        let (reply, outcome) = match dispatched {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => self.fail(&ctx, &err),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(conversation_id = %ctx.conversation_id, %reason, "query processing panicked");
                self.fail(&ctx, &NestError::Internal(reason))
            }
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.audit.record(AuditEvent::Completed {
            agent_id: self.agent_id().to_string(),
            conversation_id: ctx.conversation_id.clone(),
            outcome,
            elapsed_ms,
        });
        reply
    }

    /// Turn a failed query into an error reply and its audit outcome
    fn fail(&self, ctx: &ReplyContext, err: &NestError) -> (A2AMessage, Outcome) {
        let (code, message, suggestions) = match err {
            NestError::Validation(message) => (
                ErrorCode::InvalidQuery,
                message.clone(),
                strings(&[
                    "Provide a valid NASDAQ ticker symbol (e.g., AAPL, TSLA, MSFT)",
                    "Use format: 'analyze TICKER' or 'what about TICKER?'",
                ]),
            ),
            NestError::Collaborator(message) => (
                ErrorCode::AnalysisError,
                message.clone(),
                strings(&[
                    "Verify the ticker symbol is valid",
                    "Try again later",
                    "Contact support if the issue persists",
                ]),
            ),
            NestError::IncompleteAnalysis(message) => (
                ErrorCode::AnalysisFailed,
                message.clone(),
                strings(&[
                    "Verify the ticker symbol is correct",
                    "Try again in a few moments",
                    "Check if the stock is actively traded",
                ]),
            ),
            NestError::NoResponse(_) => (ErrorCode::NoResponse, err.to_string(), Vec::new()),
            NestError::Forward { target, source } => (
                ErrorCode::AgentCommunicationError,
                self.describe_forward_error(target, source),
                vec![
                    format!("Verify that agent '{target}' is registered and available"),
                    "Try again later".to_string(),
                    "Contact the agent administrator".to_string(),
                ],
            ),
            other => (
                ErrorCode::InternalError,
                other.to_string(),
                strings(&["Try again later", "Contact support if the issue persists"]),
            ),
        };

        let reply = format_error(&message, ctx, Some(code), &suggestions);
        (reply, Outcome::Error { code, message })
    }

    async fn dispatch(
        &self,
        query: &str,
        ctx: &ReplyContext,
    ) -> Result<(A2AMessage, Outcome), NestError> {
        let (target, payload) = parse_agent_mention(query);
        match target {
            Some(target) => {
                info!(%target, "query mentions a peer, forwarding");
                self.forward_mention(&target, &payload, ctx).await
            }
            None => self.analyze(query, ctx).await,
        }
    }

    async fn forward_mention(
        &self,
        target: &str,
        payload: &str,
        ctx: &ReplyContext,
    ) -> Result<(A2AMessage, Outcome), NestError> {
        let reply = self
            .send_to_agent(
                target,
                payload,
                Some(&ctx.conversation_id),
                ctx.parent_message_id.clone(),
                None,
            )
            .await
            .map_err(|e| NestError::Forward {
                target: target.to_string(),
                source: Box::new(e),
            })?;

        if reply.text().trim().is_empty() {
            return Err(NestError::NoResponse(target.to_string()));
        }

        let text = format!(
            "[{}] Forwarded to @{target}:\n\n{}",
            self.agent_id(),
            reply.text()
        );
        let message = A2AMessage::agent(
            text,
            ctx.conversation_id.clone(),
            ctx.parent_message_id.clone(),
        );
        Ok((
            message,
            Outcome::Forwarded {
                target: target.to_string(),
            },
        ))
    }

    fn describe_forward_error(&self, target: &str, err: &NestError) -> String {
        match err {
            NestError::NotEnabled(_) => {
                "Cannot send messages to other agents without registry configuration".to_string()
            }
            NestError::Transport(TransportError::Timeout(_)) => format!(
                "Agent '{target}' did not respond within {} seconds",
                self.forward_timeout.as_secs()
            ),
            NestError::Transport(TransportError::Connection(reason)) => {
                format!("Failed to connect to agent '{target}': {reason}")
            }
            NestError::Transport(TransportError::Status { status, body }) => {
                format!("Agent returned error: HTTP {status}: {body}")
            }
            NestError::Transport(TransportError::Decode(reason)) => {
                format!("Agent '{target}' sent a malformed reply: {reason}")
            }
            other => other.to_string(),
        }
    }

    async fn analyze(
        &self,
        query: &str,
        ctx: &ReplyContext,
    ) -> Result<(A2AMessage, Outcome), NestError> {
        debug!(%query, conversation_id = %ctx.conversation_id, "processing stock query");

        let intent = parse_intent(query);
        let ticker = match (intent.valid, intent.ticker) {
            (true, Some(ticker)) => ticker,
            (_, ticker) => {
                warn!(error = intent.error.as_deref().unwrap_or_default(), "invalid query");
                return Err(NestError::Validation(format_ticker_error(ticker.as_deref())));
            }
        };

        let analysis = self
            .analysis
            .perform_complete_analysis(&ticker, query)
            .await
            .map_err(|e| {
                error!(%ticker, error = %e, "analysis error");
                NestError::Collaborator(format!("Analysis failed for {ticker}: {e}"))
            })?;

        let Some(rec) = &analysis.recommendation else {
            error!(%ticker, "analysis produced no recommendation");
            return Err(NestError::IncompleteAnalysis(
                format!("Unable to complete analysis for {ticker}. {}", analysis.summary)
                    .trim_end()
                    .to_string(),
            ));
        };

        info!(%ticker, recommendation = %rec.recommendation, "analysis complete");
        let outcome = Outcome::Analysis {
            ticker,
            recommendation: rec.recommendation.to_string(),
            confidence: rec.confidence_score,
        };
        Ok((format_analysis(&analysis, ctx), outcome))
    }

    /// Send `text` to the peer `target_id` and return its reply
    ///
    /// A conversation id is generated when none is given. `metadata` is
    /// merged into the outgoing message metadata.
    pub async fn send_to_agent(
        &self,
        target_id: &str,
        text: &str,
        conversation_id: Option<&str>,
        parent_message_id: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<A2AMessage, NestError> {
        let registry = self.registry.as_ref().ok_or_else(|| {
            error!("cannot forward: registry client not configured");
            NestError::NotEnabled("no registry configured".to_string())
        })?;

        let target_url = registry
            .lookup_agent(target_id)
            .await
            .ok_or_else(|| NestError::Discovery(target_id.to_string()))?;

        let conversation_id = match conversation_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => new_conversation_id(),
        };
        let message = A2AMessage::forward(
            text,
            conversation_id.clone(),
            self.agent_id(),
            parent_message_id,
            metadata,
        );

        let endpoint = format!("{}/a2a", target_url.trim_end_matches('/'));
        debug!(%target_id, %endpoint, %conversation_id, "sending A2A message");
        let start = Instant::now();

        let result = self.post_message(&endpoint, &message).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => info!(%target_id, elapsed_ms, "peer replied"),
            Err(TransportError::Timeout(_)) => warn!(
                %target_id, elapsed_ms, timeout_secs = self.forward_timeout.as_secs(),
                "peer timed out"
            ),
            Err(TransportError::Connection(reason)) => {
                warn!(%target_id, elapsed_ms, %reason, "could not connect to peer");
            }
            Err(e) => warn!(%target_id, elapsed_ms, error = %e, "peer returned an error"),
        }
        result.map_err(NestError::from)
    }

    async fn post_message(
        &self,
        endpoint: &str,
        message: &A2AMessage,
    ) -> Result<A2AMessage, TransportError> {
        let client = self.http().await?;
        let response = client
            .post(endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.forward_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.forward_timeout))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok(A2AMessage::agent(String::new(), message.conversation_id.clone(), None));
        }

        let raw: Value =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))?;
        let parsed = parse_inbound(&raw);
        let conversation_id = if parsed.conversation_id.is_empty() {
            message.conversation_id.clone()
        } else {
            parsed.conversation_id
        };
        Ok(A2AMessage::agent(parsed.query, conversation_id, parsed.message_id))
    }

    async fn http(&self) -> Result<reqwest::Client, TransportError> {
        let mut guard = self.http_client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(self.forward_timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to create HTTP client: {e}")))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Aggregate health of the analysis service and the registry link
    pub async fn health(&self) -> BridgeHealth {
        let analysis_service = AssertUnwindSafe(self.analysis.service_health())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| ServiceHealth::unhealthy(panic_message(panic.as_ref())));

        let status = if analysis_service.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        BridgeHealth {
            agent_id: self.agent_id().to_string(),
            status,
            analysis_service,
            registry_configured: self.registry.is_some(),
            registry_connected: self.registry.as_ref().map(|r| r.is_registered()),
            timestamp: Utc::now(),
        }
    }

    /// Release pooled connections, including the registry's
    pub async fn close(&self) {
        if self.http_client.lock().await.take().is_some() {
            debug!("closed bridge HTTP client");
        }
        if let Some(registry) = &self.registry {
            registry.close().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
