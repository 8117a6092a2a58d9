use async_trait::async_trait;
use serde_json::json;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::systems::System;

/// A small demo system with canned weather data. It exists to exercise
/// the agent loop end to end without touching any real service.
pub struct WeatherSystem {
    tools: Vec<Tool>,
}

impl Default for WeatherSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherSystem {
    pub fn new() -> Self {
        let get_weather_tool = Tool::new(
            "get_weather",
            "获取指定城市的天气信息",
            json!({
                "type": "object",
                "properties": {
                    "city": {
                        "type": "string",
                        "description": "城市名称，如：北京、上海"
                    }
                },
                "required": ["city"]
            }),
        );

        let read_file_tool = Tool::new(
            "read_file",
            "读取文件内容",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "文件路径"
                    }
                },
                "required": ["file_path"]
            }),
        );

        Self {
            tools: vec![get_weather_tool, read_file_tool],
        }
    }

    fn get_weather(&self, city: &str) -> Vec<Content> {
        let report = match city {
            "北京" => "晴天，25°C".to_string(),
            "上海" => "多云，28°C".to_string(),
            "广州" => "雷阵雨，30°C".to_string(),
            _ => format!("未找到{}的天气信息", city),
        };
        vec![Content::text(report)]
    }

    async fn read_file(&self, path: &str) -> Vec<Content> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => vec![Content::text(content)],
            Err(e) => vec![Content::text(format!("读取文件失败: {}", e))],
        }
    }
}

#[async_trait]
impl System for WeatherSystem {
    fn name(&self) -> &str {
        "WeatherSystem"
    }

    fn description(&self) -> &str {
        "Answers weather questions from a fixed set of cities"
    }

    fn instructions(&self) -> &str {
        ""
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        match tool_call.name.as_str() {
            "get_weather" => {
                let city = tool_call
                    .arguments
                    .get("city")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        AgentError::InvalidParameters("Missing required parameter: city".to_string())
                    })?;
                Ok(self.get_weather(city))
            }
            "read_file" => {
                let file_path = tool_call
                    .arguments
                    .get("file_path")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        AgentError::InvalidParameters(
                            "Missing required parameter: file_path".to_string(),
                        )
                    })?;
                Ok(self.read_file(file_path).await)
            }
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
