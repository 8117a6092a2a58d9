use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::errors::{AgentError, AgentResult};

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON schema describing the parameters the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Check model-supplied arguments against the declared schema before
    /// dispatch: the required subset must be present, and any provided
    /// parameter with a declared primitive type must match it.
    pub fn validate(&self, arguments: &Value) -> AgentResult<()> {
        let Some(args) = arguments.as_object() else {
            return Err(AgentError::InvalidParameters(format!(
                "arguments for '{}' must be an object",
                self.name
            )));
        };

        if let Some(required) = self.input_schema.get("required").and_then(|v| v.as_array()) {
            for name in required.iter().filter_map(|v| v.as_str()) {
                if !args.contains_key(name) {
                    return Err(AgentError::InvalidParameters(format!(
                        "missing required parameter '{}' for '{}'",
                        name, self.name
                    )));
                }
            }
        }

        let Some(properties) = self
            .input_schema
            .get("properties")
            .and_then(|v| v.as_object())
        else {
            return Ok(());
        };
        for (name, value) in args {
            let declared = properties
                .get(name)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str());
            let Some(declared) = declared else { continue };
            let matches = match declared {
                "string" => value.is_string(),
                "object" => value.is_object() || value.is_null(),
                "array" => value.is_array(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !matches {
                return Err(AgentError::InvalidParameters(format!(
                    "parameter '{}' for '{}' must be of type {}",
                    name, self.name, declared
                )));
            }
        }

        Ok(())
    }
}

/// A tool call request that a system can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The arguments for the execution
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new ToolCall with the given name and arguments
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
