//! Audit trail for A2A traffic and registry operations
//!
//! Audit events are separate from diagnostics: every message and every
//! registry call produces exactly one outcome event that operators can count
//! and ship elsewhere.

use crate::codec::ErrorCode;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// How a message was finally answered
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Analysis {
        ticker: String,
        recommendation: String,
        confidence: f64,
    },
    Forwarded {
        target: String,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Registry protocol call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    Register,
    UpdateStatus,
    Lookup,
    GetInfo,
    List,
    Deregister,
}

impl RegistryOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::UpdateStatus => "update_status",
            Self::Lookup => "lookup",
            Self::GetInfo => "get_info",
            Self::List => "list",
            Self::Deregister => "deregister",
        }
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    /// A query arrived
    Incoming {
        agent_id: String,
        conversation_id: String,
        from_agent_id: Option<String>,
        query: String,
    },
    /// The reply to a query was produced
    Completed {
        agent_id: String,
        conversation_id: String,
        outcome: Outcome,
        elapsed_ms: u64,
    },
    /// A registry operation finished, after all retries
    Registry {
        operation: RegistryOperation,
        agent_id: String,
        success: bool,
        attempts: u32,
        detail: Option<String>,
    },
}

/// Sink for audit events
pub trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent);

    /// Counters, for sinks that keep them
    fn stats(&self) -> Option<AuditStats> {
        None
    }
}

/// Counters kept by [`TracingAuditLog`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub incoming_messages: u64,
    pub responses: u64,
    pub forwards: u64,
    pub errors: u64,
    pub registry_operations: u64,
    pub registry_failures: u64,
    pub total_processing_ms: u64,
}

impl AuditStats {
    pub fn average_processing_ms(&self) -> f64 {
        if self.responses == 0 {
            0.0
        } else {
            self.total_processing_ms as f64 / self.responses as f64
        }
    }
}

/// Emits events on the `audit` tracing target and keeps counters
#[derive(Debug, Default)]
pub struct TracingAuditLog {
    incoming_messages: AtomicU64,
    responses: AtomicU64,
    forwards: AtomicU64,
    errors: AtomicU64,
    registry_operations: AtomicU64,
    registry_failures: AtomicU64,
    total_processing_ms: AtomicU64,
}

impl TracingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AuditStats {
        AuditStats {
            incoming_messages: self.incoming_messages.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            forwards: self.forwards.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            registry_operations: self.registry_operations.load(Ordering::Relaxed),
            registry_failures: self.registry_failures.load(Ordering::Relaxed),
            total_processing_ms: self.total_processing_ms.load(Ordering::Relaxed),
        }
    }
}

impl AuditLog for TracingAuditLog {
    fn record(&self, event: AuditEvent) {
        match event {
            AuditEvent::Incoming {
                agent_id,
                conversation_id,
                from_agent_id,
                query,
            } => {
                self.incoming_messages.fetch_add(1, Ordering::Relaxed);
                info!(
                    target: "audit",
                    event = "incoming_message",
                    %agent_id,
                    %conversation_id,
                    from_agent_id = from_agent_id.as_deref().unwrap_or("unknown"),
                    query_len = query.len()
                );
            }
            AuditEvent::Completed {
                agent_id,
                conversation_id,
                outcome,
                elapsed_ms,
            } => {
                self.responses.fetch_add(1, Ordering::Relaxed);
                self.total_processing_ms
                    .fetch_add(elapsed_ms, Ordering::Relaxed);
                match outcome {
                    Outcome::Analysis {
                        ticker,
                        recommendation,
                        confidence,
                    } => info!(
                        target: "audit",
                        event = "analysis_response",
                        %agent_id, %conversation_id, %ticker, %recommendation, confidence, elapsed_ms
                    ),
                    Outcome::Forwarded { target } => {
                        self.forwards.fetch_add(1, Ordering::Relaxed);
                        info!(
                            target: "audit",
                            event = "forwarded_response",
                            %agent_id, %conversation_id, %target, elapsed_ms
                        );
                    }
                    Outcome::Error { code, message } => {
                        self.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            target: "audit",
                            event = "error_response",
                            %agent_id, %conversation_id, code = code.as_str(), %message, elapsed_ms
                        );
                    }
                }
            }
            AuditEvent::Registry {
                operation,
                agent_id,
                success,
                attempts,
                detail,
            } => {
                self.registry_operations.fetch_add(1, Ordering::Relaxed);
                let detail = detail.unwrap_or_default();
                if success {
                    info!(
                        target: "audit",
                        event = "registry_operation",
                        operation = operation.as_str(), %agent_id, attempts, %detail
                    );
                } else {
                    self.registry_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "audit",
                        event = "registry_operation_failed",
                        operation = operation.as_str(), %agent_id, attempts, %detail
                    );
                }
            }
        }
    }

    fn stats(&self) -> Option<AuditStats> {
        Some(self.snapshot())
    }
}
