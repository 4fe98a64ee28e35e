//! Message handler trait

use async_trait::async_trait;

/// Entry point peer transports use to hand a message to an agent
///
/// Implementations never fail: every problem is rendered into the returned
/// text so the remote side always receives a well-formed reply.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message of a conversation and return the reply text
    async fn handle(&self, text: &str, conversation_id: &str) -> String;

    /// Identifier of the agent answering
    fn agent_id(&self) -> &str;
}
