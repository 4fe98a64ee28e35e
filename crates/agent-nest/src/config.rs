//! NEST integration configuration
//!
//! Loaded once at startup from environment-style key/value pairs. Problems
//! are collected rather than raised so that an invalid setup can fall back
//! to standalone mode with a full list of what is wrong.

use crate::error::NestError;
use crate::retry::RetryPolicy;
use agent_core::AgentIdentity;
use agent_utils::EnvLookup;
use agent_utils::env::ProcessEnv;
use serde_json::{Map, Value, json};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_AGENT_ID: &str = "nasdaq-stock-agent";
pub const DEFAULT_NEST_PORT: u16 = 6000;

const DEFAULT_CAPABILITIES: &[&str] = &[
    "stock_analysis",
    "technical_analysis",
    "fundamental_analysis",
    "investment_recommendations",
    "market_data",
];

const DEFAULT_EXPERTISE: &[&str] = &[
    "NASDAQ stock analysis",
    "Technical indicators (RSI, MACD, Moving Averages)",
    "Fundamental analysis (P/E, EPS, Revenue)",
    "Market sentiment analysis",
    "Investment recommendations (BUY, SELL, HOLD)",
    "Risk assessment",
    "Portfolio optimization",
];

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert NASDAQ stock analysis agent. Your role is to provide comprehensive, \
data-driven investment analysis and recommendations for NASDAQ-listed stocks. \
You analyze technical indicators, fundamental metrics, market trends, and sentiment \
to deliver actionable insights. Always provide clear reasoning for your recommendations \
and consider both opportunities and risks. When communicating with other agents, \
be concise and focus on key insights relevant to their queries.";

/// Configuration of the A2A integration and the servers around it
#[derive(Clone)]
pub struct NestConfig {
    pub enable_nest: bool,
    pub enable_telemetry: bool,
    pub enable_dual_mode: bool,

    pub agent_id: String,
    pub agent_name: String,
    pub domain: String,
    pub specialization: String,
    pub description: String,
    pub version: String,
    /// Kept wide so out-of-range values can be reported
    pub nest_port: i64,
    pub public_url: Option<String>,
    pub registry_url: Option<String>,
    pub mcp_registry_url: Option<String>,
    pub capabilities: Vec<String>,
    pub expertise: Vec<String>,

    pub anthropic_api_key: Option<String>,
    /// Serve the API key in the administrative document instead of a mask
    pub expose_secrets: bool,
    pub model: String,
    pub system_prompt: String,

    pub registry_timeout: Duration,
    pub forward_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub registry_max_retries: u32,
    pub registry_retry_delay: Duration,
    /// Registration retries made by the heartbeat loop; 0 disables them
    pub reregister_attempts: u32,

    pub api_host: String,
    pub api_port: u16,

    /// Values that could not be parsed during loading
    parse_errors: Vec<String>,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            enable_nest: false,
            enable_telemetry: true,
            enable_dual_mode: false,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            agent_name: "NASDAQ Stock Agent".to_string(),
            domain: "financial analysis".to_string(),
            specialization: "NASDAQ stock analysis and investment recommendations".to_string(),
            description: "AI-powered stock analysis agent providing comprehensive investment analysis for NASDAQ stocks".to_string(),
            version: "1.0.0".to_string(),
            nest_port: i64::from(DEFAULT_NEST_PORT),
            public_url: None,
            registry_url: None,
            mcp_registry_url: None,
            capabilities: DEFAULT_CAPABILITIES.iter().map(ToString::to_string).collect(),
            expertise: DEFAULT_EXPERTISE.iter().map(ToString::to_string).collect(),
            anthropic_api_key: None,
            expose_secrets: false,
            model: "claude-3-sonnet-20240229".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            registry_timeout: Duration::from_secs(10),
            forward_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            registry_max_retries: 3,
            registry_retry_delay: Duration::from_millis(1000),
            reregister_attempts: 0,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            parse_errors: Vec::new(),
        }
    }
}

fn parse_or_record<T>(env: &impl EnvLookup, key: &str, default: T, errors: &mut Vec<String>) -> T
where
    T: FromStr + Copy,
    T::Err: Display,
{
    env.parse(key, default).unwrap_or_else(|e| {
        errors.push(e.to_string());
        default
    })
}

impl NestConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(&ProcessEnv)
    }

    /// Load from any environment source
    pub fn from_lookup(env: &impl EnvLookup) -> Self {
        let d = Self::default();
        let mut errors = Vec::new();

        let registry_timeout = parse_or_record(env, "NEST_REGISTRY_TIMEOUT_SECS", d.registry_timeout.as_secs(), &mut errors);
        let forward_timeout = parse_or_record(env, "NEST_FORWARD_TIMEOUT_SECS", d.forward_timeout.as_secs(), &mut errors);
        let heartbeat_interval = parse_or_record(env, "NEST_HEARTBEAT_INTERVAL_SECS", d.heartbeat_interval.as_secs(), &mut errors);
        let retry_delay_ms = parse_or_record(env, "NEST_REGISTRY_RETRY_DELAY_MS", 1000_u64, &mut errors);

        Self {
            enable_nest: env.flag("NEST_ENABLED", d.enable_nest),
            enable_telemetry: env.flag("NEST_TELEMETRY", d.enable_telemetry),
            enable_dual_mode: env.flag("NEST_DUAL_MODE", d.enable_dual_mode),
            agent_id: env.get("NEST_AGENT_ID").map_or(d.agent_id, |v| v.trim().to_string()),
            agent_name: env.get("NEST_AGENT_NAME").map_or(d.agent_name, |v| v.trim().to_string()),
            domain: env.string("NEST_DOMAIN", &d.domain),
            specialization: env.string("NEST_SPECIALIZATION", &d.specialization),
            description: env.string("NEST_DESCRIPTION", &d.description),
            version: env.string("NEST_VERSION", &d.version),
            nest_port: parse_or_record(env, "NEST_PORT", d.nest_port, &mut errors),
            public_url: env.optional("NEST_PUBLIC_URL"),
            registry_url: env.optional("NEST_REGISTRY_URL"),
            mcp_registry_url: env.optional("NEST_MCP_REGISTRY_URL"),
            capabilities: env.get("NEST_CAPABILITIES").map_or(d.capabilities, |raw| agent_utils::env::split_list(&raw)),
            expertise: env.list("NEST_EXPERTISE", DEFAULT_EXPERTISE),
            anthropic_api_key: env.optional("ANTHROPIC_API_KEY"),
            expose_secrets: env.flag("NEST_EXPOSE_SECRETS", d.expose_secrets),
            model: env.string("ANTHROPIC_MODEL", &d.model),
            system_prompt: env.string("NEST_SYSTEM_PROMPT", &d.system_prompt),
            registry_timeout: Duration::from_secs(registry_timeout),
            forward_timeout: Duration::from_secs(forward_timeout),
            heartbeat_interval: Duration::from_secs(heartbeat_interval),
            registry_max_retries: parse_or_record(env, "NEST_REGISTRY_MAX_RETRIES", d.registry_max_retries, &mut errors),
            registry_retry_delay: Duration::from_millis(retry_delay_ms),
            reregister_attempts: parse_or_record(env, "NEST_REREGISTER_ATTEMPTS", d.reregister_attempts, &mut errors),
            api_host: env.string("API_HOST", &d.api_host),
            api_port: parse_or_record(env, "API_PORT", d.api_port, &mut errors),
            parse_errors: errors,
        }
    }

    /// Every problem with an enabled configuration, itemised
    ///
    /// A disabled integration is always valid.
    pub fn validate(&self) -> Result<(), NestError> {
        if !self.enable_nest {
            info!("NEST integration is disabled - running in standalone mode");
            return Ok(());
        }

        let mut errors = self.parse_errors.clone();

        if self.agent_id.is_empty() {
            errors.push("NEST_AGENT_ID is required when NEST is enabled".to_string());
        } else if let Err(e) = self.identity().validate() {
            errors.push(e.to_string());
        }
        if self.agent_name.is_empty() {
            errors.push("NEST_AGENT_NAME is required when NEST is enabled".to_string());
        }
        if !(1..=65535).contains(&self.nest_port) {
            errors.push(format!(
                "NEST_PORT must be between 1 and 65535, got {}",
                self.nest_port
            ));
        }
        if self.capabilities.is_empty() {
            errors.push("Agent must have at least one capability".to_string());
        }
        if self.heartbeat_interval.is_zero() {
            errors.push("NEST_HEARTBEAT_INTERVAL_SECS must be greater than 0".to_string());
        }
        for (key, value) in [
            ("NEST_PUBLIC_URL", &self.public_url),
            ("NEST_REGISTRY_URL", &self.registry_url),
            ("NEST_MCP_REGISTRY_URL", &self.mcp_registry_url),
        ] {
            if let Some(Err(e)) = value.as_deref().map(url::Url::parse) {
                errors.push(format!(
                    "{key} is not a valid URL ('{}'): {e}",
                    value.as_deref().unwrap_or_default()
                ));
            }
        }

        if self.public_url.is_none() {
            warn!("NEST_PUBLIC_URL not set - agent may not be accessible externally");
        }
        if self.registry_url.is_none() {
            warn!("NEST_REGISTRY_URL not set - agent will not register with registry");
        }

        if errors.is_empty() {
            info!(agent_id = %self.agent_id, "NEST configuration validated");
            Ok(())
        } else {
            error!(errors = %errors.join(", "), "NEST configuration validation failed");
            Err(NestError::Config(errors))
        }
    }

    /// Whether to run the A2A integration; false means standalone
    pub fn should_enable_nest(&self) -> bool {
        if !self.enable_nest {
            info!("NEST is disabled via configuration - using standalone mode");
            return false;
        }
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "NEST configuration is invalid, falling back to standalone mode");
                false
            }
        }
    }

    /// Port of the A2A server
    pub fn port(&self) -> u16 {
        u16::try_from(self.nest_port).unwrap_or(DEFAULT_NEST_PORT)
    }

    /// URL peers use to reach this agent
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port()))
    }

    /// Immutable identity shared by the running components
    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(
            self.agent_id.clone(),
            self.agent_name.clone(),
            self.public_url(),
            self.port(),
        )
        .with_domain(self.domain.clone(), self.specialization.clone())
        .with_description(self.description.clone())
        .with_capabilities(self.capabilities.iter().cloned())
        .with_expertise(self.expertise.iter().cloned())
        .with_version(self.version.clone())
    }

    /// Registry retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.registry_max_retries, self.registry_retry_delay)
    }

    /// Identity fields merged into the registration document
    pub fn registration_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("agent_name".into(), json!(self.agent_name));
        metadata.insert("domain".into(), json!(self.domain));
        metadata.insert("specialization".into(), json!(self.specialization));
        metadata.insert("description".into(), json!(self.description));
        metadata.insert("version".into(), json!(self.version));
        metadata.insert("expertise".into(), json!(self.expertise));
        metadata
    }

    /// Identity document for peers; carries no secrets
    pub fn peer_document(&self, status: &str) -> Value {
        json!({
            "agent_id": self.agent_id,
            "agent_name": self.agent_name,
            "domain": self.domain,
            "specialization": self.specialization,
            "description": self.description,
            "expertise": self.expertise,
            "capabilities": self.capabilities,
            "public_url": self.public_url(),
            "model": self.model,
            "version": self.version,
            "status": status,
            "port": self.port(),
        })
    }

    /// Full document for local operators
    ///
    /// The API key is masked unless `expose_secrets` is set.
    pub fn admin_document(&self, status: &str) -> Value {
        let mut document = self.peer_document(status);
        if let Value::Object(map) = &mut document {
            map.insert("registry_url".into(), json!(self.registry_url));
            map.insert("mcp_registry_url".into(), json!(self.mcp_registry_url));
            map.insert("system_prompt".into(), json!(self.system_prompt));
            let api_key = match &self.anthropic_api_key {
                Some(key) if self.expose_secrets => json!(key),
                Some(_) => json!("***"),
                None => Value::Null,
            };
            map.insert("anthropic_api_key".into(), api_key);
            map.insert("enable_telemetry".into(), json!(self.enable_telemetry));
            map.insert("enable_dual_mode".into(), json!(self.enable_dual_mode));
        }
        document
    }
}

impl fmt::Debug for NestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestConfig")
            .field("agent_id", &self.agent_id)
            .field("enable_nest", &self.enable_nest)
            .field("enable_dual_mode", &self.enable_dual_mode)
            .field("nest_port", &self.nest_port)
            .field("public_url", &self.public_url)
            .field("registry_url", &self.registry_url)
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "***"),
            )
            .field("api_port", &self.api_port)
            .finish_non_exhaustive()
    }
}
