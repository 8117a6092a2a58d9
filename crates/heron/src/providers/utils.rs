use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::StopReason;

/// Convert internal Message format to the Anthropic messages API spec.
/// Tool results always land in a user message; the `is_error` flag is set
/// when a tool result carries an error instead of content.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let mut blocks = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        blocks.push(json!({
                            "type": "text",
                            "text": text.text,
                        }));
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": request.id,
                            "name": tool_call.name,
                            "input": tool_call.arguments,
                        }));
                    }
                    Err(e) => {
                        blocks.push(json!({
                            "type": "text",
                            "text": format!("Malformed tool call: {}", e),
                        }));
                    }
                },
                MessageContent::ToolResponse(response) => match &response.tool_result {
                    Ok(contents) => {
                        let text: Vec<&str> =
                            contents.iter().filter_map(|c| c.as_text()).collect();
                        blocks.push(json!({
                            "type": "tool_result",
                            "tool_use_id": response.id,
                            "content": text.join("\n"),
                        }));
                    }
                    Err(e) => {
                        // Shown as an errored result so the model can react to it
                        blocks.push(json!({
                            "type": "tool_result",
                            "tool_use_id": response.id,
                            "content": format!("The tool call returned the following error:\n{}", e),
                            "is_error": true,
                        }));
                    }
                },
            }
        }

        if !blocks.is_empty() {
            messages_spec.push(json!({
                "role": role,
                "content": blocks,
            }));
        }
    }

    messages_spec
}

/// Convert internal Tool format to the Anthropic tool specification
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema,
        }));
    }

    Ok(result)
}

/// Convert an Anthropic messages API response to the internal Message format
pub fn anthropic_response_to_message(response: &Value) -> Result<Message> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API"))?;

    let mut content = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    content.push(MessageContent::text(text));
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"].as_str().unwrap_or_default().to_string();

                if !is_valid_function_name(&name) {
                    let error = AgentError::ToolNotFound(format!(
                        "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                        name
                    ));
                    content.push(MessageContent::tool_request(id, Err(error)));
                } else if let Some(input) = block.get("input").filter(|i| i.is_object()) {
                    content.push(MessageContent::tool_request(
                        id,
                        Ok(ToolCall::new(&name, input.clone())),
                    ));
                } else {
                    let error = AgentError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: input is not an object",
                        id
                    ));
                    content.push(MessageContent::tool_request(id, Err(error)));
                }
            }
            _ => {}
        }
    }

    Ok(Message {
        role: Role::Assistant,
        created: chrono::Utc::now().timestamp(),
        content,
    })
}

/// Extract the completion reason; anything that isn't a tool-use request
/// counts as the end of the turn.
pub fn anthropic_stop_reason(response: &Value) -> StopReason {
    match response.get("stop_reason").and_then(|r| r.as_str()) {
        Some("tool_use") => StopReason::ToolUse,
        _ => StopReason::EndTurn,
    }
}

fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}
