use anyhow::{anyhow, Result};
use futures::stream::BoxStream;
use std::collections::HashSet;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::{Provider, StopReason};
use crate::systems::System;

/// The literal result text the model sees when it requests a tool that
/// no system registered.
pub const UNKNOWN_TOOL: &str = "未知工具";

/// One streamed step of a reply: a message plus the completion reason of
/// the turn it belongs to, so callers can report the model's status.
#[derive(Debug, Clone)]
pub struct AgentStep {
    pub message: Message,
    pub stop_reason: StopReason,
}

/// Agent tuning knobs. The turn cap is configuration rather than a
/// constant: the API-test variant runs with 15, the weather demo with 10.
pub struct AgentConfig {
    /// Maximum number of model-call/tool-execution cycles per run
    pub max_turns: usize,
    /// Overrides the system instructions collected from the systems
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            system_prompt: None,
        }
    }
}

/// Agent integrates a foundational LLM with the systems it needs to pilot
pub struct Agent {
    systems: Vec<Box<dyn System>>,
    provider: Box<dyn Provider>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new Agent with the specified provider and default config
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self::with_config(provider, AgentConfig::default())
    }

    pub fn with_config(provider: Box<dyn Provider>, config: AgentConfig) -> Self {
        Self {
            systems: Vec::new(),
            provider,
            config,
        }
    }

    /// Add a system to the agent
    pub fn add_system(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Get the flat tool catalogue across all systems
    fn get_tools(&self) -> Vec<Tool> {
        self.systems
            .iter()
            .flat_map(|system| system.tools().iter().cloned())
            .collect()
    }

    /// Find the system that declares a tool of the given name
    fn get_system_for_tool(&self, name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|system| system.tools().iter().any(|tool| tool.name == name))
            .map(|system| &**system)
    }

    fn get_system_prompt(&self) -> String {
        if let Some(prompt) = &self.config.system_prompt {
            return prompt.clone();
        }
        self.systems
            .iter()
            .map(|system| system.instructions())
            .filter(|instructions| !instructions.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Dispatch a single tool call to the system that declares it.
    ///
    /// A fault inside a tool is never a loop fault: unknown names become
    /// the sentinel text, validation failures and handler errors become
    /// error strings the model can react to on the next turn. The only
    /// `Err` this returns echoes a request the provider could not parse.
    async fn dispatch_tool_call(
        &self,
        tool_call: AgentResult<ToolCall>,
    ) -> AgentResult<Vec<Content>> {
        let call = tool_call?;

        let Some(system) = self.get_system_for_tool(&call.name) else {
            return Ok(vec![Content::text(UNKNOWN_TOOL)]);
        };

        let tool = system
            .tools()
            .iter()
            .find(|tool| tool.name == call.name)
            .cloned();
        if let Some(tool) = tool {
            if let Err(e) = tool.validate(&call.arguments) {
                return Ok(vec![Content::text(format!("错误：{}", e))]);
            }
        }

        match system.call(call).await {
            Ok(contents) => Ok(contents),
            Err(AgentError::ToolNotFound(_)) => Ok(vec![Content::text(UNKNOWN_TOOL)]),
            Err(e) => Ok(vec![Content::text(format!("错误：{}", e))]),
        }
    }

    /// Create a stream that yields each step as it's generated by the agent:
    /// one assistant message per turn, followed by one user message carrying
    /// the tool results when tools were requested. Every step carries the
    /// completion reason of its turn.
    ///
    /// The stream ends after the assistant message of a turn with no tool
    /// requests. Running out of turns with tools still being requested ends
    /// the stream with [`AgentError::TurnLimitExceeded`]; a provider failure
    /// ends it with that error, unretried.
    pub async fn reply(&self, messages: &[Message]) -> Result<BoxStream<'_, Result<AgentStep>>> {
        let mut messages = messages.to_vec();
        let tools = self.get_tools();
        ensure_unique_tool_names(&tools)?;
        let system_prompt = self.get_system_prompt();
        let max_turns = self.config.max_turns;

        Ok(Box::pin(async_stream::try_stream! {
            let mut turn = 0;
            loop {
                if turn >= max_turns {
                    Err(AgentError::TurnLimitExceeded(max_turns))?;
                }
                turn += 1;

                let completion = self.provider.complete(
                    &system_prompt,
                    &messages,
                    &tools,
                ).await?;
                let stop_reason = completion.stop_reason;
                let response = completion.message;

                yield AgentStep {
                    message: response.clone(),
                    stop_reason,
                };

                let tool_requests: Vec<ToolRequest> = response.content
                    .iter()
                    .filter_map(|content| content.as_tool_request().cloned())
                    .collect();

                if stop_reason == StopReason::EndTurn || tool_requests.is_empty() {
                    break;
                }

                messages.push(response);

                // Execute the requests strictly in the order the model
                // emitted them; results stay correlated by request id.
                let mut message_tool_response = Message::user();
                for request in &tool_requests {
                    let output = self.dispatch_tool_call(request.tool_call.clone()).await;
                    message_tool_response = message_tool_response.with_tool_response(
                        request.id.clone(),
                        output,
                    );
                }

                yield AgentStep {
                    message: message_tool_response.clone(),
                    stop_reason,
                };
                messages.push(message_tool_response);
            }
        }))
    }
}

/// Every declared tool must route to exactly one system; colliding names
/// fail the request before the first model call.
fn ensure_unique_tool_names(tools: &[Tool]) -> Result<()> {
    let mut names = HashSet::new();
    for tool in tools {
        if !names.insert(tool.name.as_str()) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }
    }
    Ok(())
}
