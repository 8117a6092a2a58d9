use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Completion, Provider, Usage};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    anthropic_response_to_message, anthropic_stop_reason, messages_to_anthropic_spec,
    tools_to_anthropic_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = data.get("usage");

        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            _ => {
                let error_text = response.text().await?;
                Err(anyhow!("Request failed: {}", error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<Completion> {
        let anthropic_messages = messages_to_anthropic_spec(messages);
        let tools_spec = if !tools.is_empty() {
            tools_to_anthropic_spec(tools)?
        } else {
            vec![]
        };

        let mut payload = json!({
            "model": self.config.model,
            "messages": anthropic_messages,
            "max_tokens": self.config.max_tokens.unwrap_or(4096)
        });

        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        // Make request
        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Anthropic API error: {}", error));
        }

        let message = anthropic_response_to_message(&response)?;
        let stop_reason = anthropic_stop_reason(&response);
        let usage = Self::get_usage(&response);

        Ok(Completion {
            message,
            stop_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageContent;
    use crate::providers::base::StopReason;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: None,
            max_tokens: Some(1024),
        };

        let provider = AnthropicProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "你好！有什么可以帮你？"
            }],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {
                "input_tokens": 12,
                "output_tokens": 15
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("你好")];

        let completion = provider.complete("", &messages, &[]).await?;

        if let MessageContent::Text(text) = &completion.message.content[0] {
            assert_eq!(text.text, "你好！有什么可以帮你？");
        } else {
            panic!("Expected Text content");
        }
        assert_eq!(completion.stop_reason, StopReason::EndTurn);
        assert_eq!(completion.usage.input_tokens, Some(12));
        assert_eq!(completion.usage.output_tokens, Some(15));
        assert_eq!(completion.usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "msg_tool",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "tool_use",
                "id": "toolu_42",
                "name": "get_weather",
                "input": {"city": "北京"}
            }],
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "tool_use",
            "usage": {
                "input_tokens": 20,
                "output_tokens": 15
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("北京天气怎么样？")];
        let tool = Tool::new(
            "get_weather",
            "获取指定城市的天气信息",
            json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string", "description": "城市名称，如：北京、上海"}
                },
                "required": ["city"]
            }),
        );

        let completion = provider
            .complete("You are a helpful assistant.", &messages, &[tool])
            .await?;

        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        if let MessageContent::ToolRequest(tool_request) = &completion.message.content[0] {
            assert_eq!(tool_request.id, "toolu_42");
            let tool_call = tool_request.tool_call.as_ref().unwrap();
            assert_eq!(tool_call.name, "get_weather");
            assert_eq!(tool_call.arguments, json!({"city": "北京"}));
        } else {
            panic!("Expected ToolRequest content");
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_is_fatal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: None,
            max_tokens: None,
        };
        let provider = AnthropicProvider::new(config).unwrap();

        let messages = vec![Message::user().with_text("你好")];
        let error = provider.complete("", &messages, &[]).await.unwrap_err();
        assert!(error.to_string().contains("Server error"));
    }
}
