//! Agent identity
//!
//! `AgentIdentity` is built once from configuration at startup and shared
//! read-only (usually behind an `Arc`) by every component of the process.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Immutable description of an agent on the peer network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Unique identifier used for registry lookups and `@mentions`
    pub agent_id: String,
    /// Human readable name
    pub display_name: String,
    pub domain: String,
    pub specialization: String,
    pub description: String,
    /// Capabilities advertised to the registry
    pub capabilities: BTreeSet<String>,
    /// Areas of expertise, in presentation order
    pub expertise: Vec<String>,
    pub version: String,
    /// URL peers use to reach this agent's A2A endpoint
    pub public_url: String,
    /// Port the A2A server listens on
    pub port: u16,
}

impl AgentIdentity {
    /// Create an identity with the given id, name and reachable URL
    pub fn new(
        agent_id: impl Into<String>,
        display_name: impl Into<String>,
        public_url: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            display_name: display_name.into(),
            domain: String::new(),
            specialization: String::new(),
            description: String::new(),
            capabilities: BTreeSet::new(),
            expertise: Vec::new(),
            version: "1.0.0".to_string(),
            public_url: public_url.into(),
            port,
        }
    }

    /// Set the domain and specialization
    pub fn with_domain(
        mut self,
        domain: impl Into<String>,
        specialization: impl Into<String>,
    ) -> Self {
        self.domain = domain.into();
        self.specialization = specialization.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add capabilities (duplicates collapse)
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Set the expertise list
    pub fn with_expertise<I, S>(mut self, expertise: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise = expertise.into_iter().map(Into::into).collect();
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Capabilities as an ordered list, as sent over the wire
    pub fn capability_list(&self) -> Vec<String> {
        self.capabilities.iter().cloned().collect()
    }

    /// Check the fields every agent must carry
    ///
    /// Peers address an agent as `@agent_id`, so the id is limited to word
    /// characters and hyphens.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::InvalidIdentity("agent_id is empty".to_string()));
        }
        if !self
            .agent_id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidIdentity(format!(
                "agent_id '{}' may only contain letters, digits, '_' and '-'",
                self.agent_id
            )));
        }
        if self.public_url.trim().is_empty() {
            return Err(Error::InvalidIdentity("public_url is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let identity = AgentIdentity::new("stock", "Stock Agent", "http://localhost:6000", 6000)
            .with_domain("financial analysis", "NASDAQ stocks")
            .with_capabilities(["stock_analysis", "market_data", "stock_analysis"])
            .with_expertise(["RSI", "MACD"])
            .with_version("2.0.0");

        assert_eq!(identity.domain, "financial analysis");
        assert_eq!(identity.capabilities.len(), 2);
        assert_eq!(
            identity.capability_list(),
            vec!["market_data".to_string(), "stock_analysis".to_string()]
        );
        assert_eq!(identity.expertise, vec!["RSI", "MACD"]);
        assert_eq!(identity.version, "2.0.0");
        assert!(identity.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let identity = AgentIdentity::new("  ", "Stock Agent", "http://localhost:6000", 6000);
        let err = identity.validate().unwrap_err();
        assert!(err.to_string().contains("agent_id"));
    }

    #[test]
    fn test_validate_rejects_unmentionable_id() {
        let identity = AgentIdentity::new("stock agent", "Stock Agent", "http://localhost:6000", 6000);
        let err = identity.validate().unwrap_err();
        assert!(err.to_string().contains("'stock agent'"));

        let identity = AgentIdentity::new("stock_agent-2", "Stock Agent", "http://localhost:6000", 6000);
        assert!(identity.validate().is_ok());
    }

    #[test]
    fn test_serde_roundtrip_keeps_fields() {
        let identity = AgentIdentity::new("a", "A", "http://a", 1).with_capabilities(["x"]);
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["agent_id"], "a");
        assert_eq!(json["capabilities"][0], "x");
    }
}
