use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Core trait that defines a system that can be operated by an AI agent.
///
/// A system is a static catalogue of tools plus the code that executes
/// them. The tools list is fixed at construction and advertised to the
/// model on every request; `call` routes a validated tool call to the
/// matching implementation.
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get system instructions, included in the system prompt
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given parameters
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>>;
}
