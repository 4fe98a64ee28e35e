//! A2A wire messages
//!
//! Outbound replies are rendered from an analysis or an error descriptor;
//! inbound messages are decoded tolerantly so that a sloppy peer still gets
//! an answer instead of a protocol error.

use agent_stock::StockAnalysis;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// Message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            content_type: default_content_type(),
        }
    }
}

/// A2A wire message, used in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A2AMessage {
    pub role: Role,
    pub content: MessageContent,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl A2AMessage {
    /// Agent reply
    pub fn agent(
        text: impl Into<String>,
        conversation_id: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        Self {
            role: Role::Agent,
            content: MessageContent::text(text),
            conversation_id: conversation_id.into(),
            parent_message_id,
            metadata: None,
        }
    }

    /// Message sent on behalf of `from_agent_id` to a peer
    ///
    /// Metadata always carries `from_agent_id` and a `timestamp`; `extra`
    /// entries are merged in without overriding those two.
    pub fn forward(
        text: impl Into<String>,
        conversation_id: impl Into<String>,
        from_agent_id: &str,
        parent_message_id: Option<String>,
        extra: Option<Map<String, Value>>,
    ) -> Self {
        let mut metadata = extra.unwrap_or_default();
        metadata.insert("from_agent_id".into(), Value::from(from_agent_id));
        metadata.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));

        Self {
            role: Role::User,
            content: MessageContent::text(text),
            conversation_id: conversation_id.into(),
            parent_message_id,
            metadata: Some(metadata),
        }
    }

    pub fn text(&self) -> &str {
        &self.content.text
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Where a reply goes and who sends it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyContext {
    pub agent_id: String,
    pub conversation_id: String,
    pub parent_message_id: Option<String>,
}

impl ReplyContext {
    pub fn new(agent_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            conversation_id: conversation_id.into(),
            parent_message_id: None,
        }
    }

    pub fn with_parent(mut self, parent_message_id: Option<String>) -> Self {
        self.parent_message_id = parent_message_id;
        self
    }
}

/// Machine readable error categories carried in error replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidQuery,
    AnalysisFailed,
    AnalysisError,
    AgentCommunicationError,
    NoResponse,
    InternalError,
    MessageProcessingError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidQuery => "INVALID_QUERY",
            Self::AnalysisFailed => "ANALYSIS_FAILED",
            Self::AnalysisError => "ANALYSIS_ERROR",
            Self::AgentCommunicationError => "AGENT_COMMUNICATION_ERROR",
            Self::NoResponse => "NO_RESPONSE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::MessageProcessingError => "MESSAGE_PROCESSING_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded inbound message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedQuery {
    pub query: String,
    pub conversation_id: String,
    pub message_id: Option<String>,
    pub from_agent_id: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Render an analysis into an agent reply
///
/// Sections without source data are left out.
pub fn format_analysis(analysis: &StockAnalysis, ctx: &ReplyContext) -> A2AMessage {
    let mut lines = vec![
        format!(
            "[{}] {} ({}) Analysis:",
            ctx.agent_id, analysis.company_name, analysis.ticker
        ),
        String::new(),
    ];

    if let Some(market) = &analysis.market_data {
        let change = market.price_change_percentage();
        let sign = if change >= 0.0 { "+" } else { "" };
        lines.push(format!(
            "Current Price: ${:.2} ({sign}{change:.1}%)",
            market.current_price
        ));
    }

    if let Some(rec) = &analysis.recommendation {
        lines.push(format!(
            "AI Recommendation: {} (Confidence: {:.0}%)",
            rec.recommendation, rec.confidence_score
        ));
        lines.push(String::new());

        if !rec.key_factors.is_empty() {
            lines.push("Key Factors:".to_string());
            lines.extend(rec.key_factors.iter().map(|f| format!("• {f}")));
        }

        lines.push(String::new());
        lines.push(format!("Risk Assessment: {}", rec.risk_assessment));
        lines.push(String::new());
        lines.push(format!("Reasoning: {}", rec.reasoning));
    }

    if !analysis.summary.is_empty() {
        lines.push(String::new());
        lines.push(format!("Summary: {}", analysis.summary));
    }

    A2AMessage::agent(
        lines.join("\n"),
        ctx.conversation_id.clone(),
        ctx.parent_message_id.clone(),
    )
}

/// Render an error into an agent reply
pub fn format_error(
    message: &str,
    ctx: &ReplyContext,
    code: Option<ErrorCode>,
    suggestions: &[String],
) -> A2AMessage {
    let mut lines = vec![format!("[{}] ❌ Error: {message}", ctx.agent_id)];

    if let Some(code) = code {
        lines.push(format!("Error Code: {code}"));
    }

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("Suggestions:".to_string());
        lines.extend(suggestions.iter().map(|s| format!("• {s}")));
    }

    A2AMessage::agent(
        lines.join("\n"),
        ctx.conversation_id.clone(),
        ctx.parent_message_id.clone(),
    )
}

/// Decode an inbound message, defaulting whatever is missing
///
/// `content` may be an object with `text` or a bare string. The message id
/// is read from `message_id`, falling back to `id`.
pub fn parse_inbound(raw: &Value) -> ParsedQuery {
    let query = match raw.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(content)) => content
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };

    let string_field = |key: &str| raw.get(key).and_then(Value::as_str).map(ToString::to_string);

    let metadata = raw
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let from_agent_id = metadata
        .get("from_agent_id")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    ParsedQuery {
        query,
        conversation_id: string_field("conversation_id").unwrap_or_default(),
        message_id: string_field("message_id").or_else(|| string_field("id")),
        from_agent_id,
        metadata,
    }
}

/// Fresh conversation id: `conv-YYYYmmdd-HHMMSS-xxxxxxxx`
pub fn new_conversation_id() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "conv-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        &simple[..8]
    )
}
