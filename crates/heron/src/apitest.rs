use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};
use crate::prompts::API_TEST_INSTRUCTIONS;
use crate::systems::System;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const PYTEST_TIMEOUT: Duration = Duration::from_secs(60);
const BODY_PREVIEW_CHARS: usize = 2000;

/// ApiTestSystem provides the tools an agent needs to turn a Swagger
/// document into running pytest suites: reading specs, writing and
/// executing tests, and probing endpoints directly.
///
/// All paths are resolved relative to the project root given at
/// construction; generated tests land under `<root>/tests`.
pub struct ApiTestSystem {
    tools: Vec<Tool>,
    root: PathBuf,
    client: reqwest::Client,
    pytest_runner: String,
}

impl ApiTestSystem {
    pub fn new(root: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let read_swagger_tool = Tool::new(
            "read_swagger",
            "读取 Swagger/OpenAPI 文档，获取接口定义。支持 JSON 和 YAML 格式",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Swagger 文件路径，如 swagger/api.json"
                    }
                },
                "required": ["file_path"]
            }),
        );

        let write_test_file_tool = Tool::new(
            "write_test_file",
            "将生成的 pytest 测试代码写入文件",
            json!({
                "type": "object",
                "properties": {
                    "file_name": {
                        "type": "string",
                        "description": "测试文件名，如 test_users.py"
                    },
                    "content": {
                        "type": "string",
                        "description": "pytest 测试代码内容"
                    }
                },
                "required": ["file_name", "content"]
            }),
        );

        let run_pytest_tool = Tool::new(
            "run_pytest",
            "运行 pytest 测试，返回测试结果",
            json!({
                "type": "object",
                "properties": {
                    "test_file": {
                        "type": "string",
                        "description": "要运行的测试文件，如 test_users.py。不填则运行全部测试"
                    }
                },
                "required": []
            }),
        );

        let read_file_tool = Tool::new(
            "read_file",
            "读取任意文件内容",
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

        let send_http_request_tool = Tool::new(
            "send_http_request",
            "发送 HTTP 请求测试接口",
            json!({
                "type": "object",
                "properties": {
                    "method": {
                        "type": "string",
                        "description": "HTTP 方法：GET, POST, PUT, DELETE"
                    },
                    "url": {
                        "type": "string",
                        "description": "完整的请求 URL"
                    },
                    "headers": {
                        "type": "object",
                        "description": "请求头"
                    },
                    "body": {
                        "type": "object",
                        "description": "请求体（JSON）"
                    }
                },
                "required": ["method", "url"]
            }),
        );

        let list_files_tool = Tool::new(
            "list_files",
            "列出目录下的文件",
            json!({
                "type": "object",
                "properties": {
                    "directory": {
                        "type": "string",
                        "description": "目录路径，默认为项目根目录"
                    }
                },
                "required": []
            }),
        );

        Ok(Self {
            tools: vec![
                read_swagger_tool,
                write_test_file_tool,
                run_pytest_tool,
                read_file_tool,
                send_http_request_tool,
                list_files_tool,
            ],
            root,
            client,
            pytest_runner: "pytest".to_string(),
        })
    }

    /// Replace the pytest binary. Used in tests to substitute a stand-in
    /// that exists on the build host.
    pub fn with_runner<S: Into<String>>(mut self, runner: S) -> Self {
        self.pytest_runner = runner.into();
        self
    }

    /// Read a Swagger document and normalize it to pretty-printed JSON.
    /// YAML input is converted; unrecognized extensions pass through raw.
    async fn read_swagger(&self, file_path: &str) -> AgentResult<Vec<Content>> {
        let full_path = self.root.join(file_path);
        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(vec![Content::text(format!(
                    "错误：文件不存在 - {}",
                    full_path.display()
                ))]);
            }
            Err(e) => {
                return Ok(vec![Content::text(format!("错误：读取文件失败 - {}", e))]);
            }
        };

        let normalized = if file_path.ends_with(".json") {
            serde_json::from_str::<Value>(&content)
                .map_err(|e| format!("{}", e))
                .and_then(|data| serde_json::to_string_pretty(&data).map_err(|e| format!("{}", e)))
        } else if file_path.ends_with(".yaml") || file_path.ends_with(".yml") {
            serde_yaml::from_str::<Value>(&content)
                .map_err(|e| format!("{}", e))
                .and_then(|data| serde_json::to_string_pretty(&data).map_err(|e| format!("{}", e)))
        } else {
            Ok(content)
        };

        match normalized {
            Ok(text) => Ok(vec![Content::text(text)]),
            Err(e) => Ok(vec![Content::text(format!("错误：读取文件失败 - {}", e))]),
        }
    }

    /// Write a generated pytest file under `<root>/tests`, creating the
    /// directory if needed.
    async fn write_test_file(&self, file_name: &str, content: &str) -> AgentResult<Vec<Content>> {
        let tests_dir = self.root.join("tests");
        if let Err(e) = tokio::fs::create_dir_all(&tests_dir).await {
            return Ok(vec![Content::text(format!("错误：写入文件失败 - {}", e))]);
        }

        let file_path = tests_dir.join(file_name);
        match tokio::fs::write(&file_path, content).await {
            Ok(()) => Ok(vec![Content::text(format!(
                "成功：测试文件已写入 - {}",
                file_path.display()
            ))]),
            Err(e) => Ok(vec![Content::text(format!("错误：写入文件失败 - {}", e))]),
        }
    }

    /// Run pytest against one test file, or the whole tests directory when
    /// no file is given. Kills the run after 60 seconds.
    async fn run_pytest(&self, test_file: Option<&str>) -> AgentResult<Vec<Content>> {
        let tests_dir = self.root.join("tests");
        let target = match test_file {
            Some(file) => tests_dir.join(file),
            None => tests_dir,
        };

        let run = Command::new(&self.pytest_runner)
            .arg(&target)
            .arg("-v")
            .arg("--tb=short")
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(PYTEST_TIMEOUT, run).await {
            Err(_) => {
                return Ok(vec![Content::text("错误：测试执行超时（60秒）")]);
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Ok(vec![Content::text(
                    "错误：pytest 未安装，请运行 pip install pytest",
                )]);
            }
            Ok(Err(e)) => {
                return Ok(vec![Content::text(format!("错误：执行测试失败 - {}", e))]);
            }
            Ok(Ok(output)) => output,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if combined.is_empty() {
            Ok(vec![Content::text("测试执行完成，无输出")])
        } else {
            Ok(vec![Content::text(combined)])
        }
    }

    async fn read_file(&self, file_path: &str) -> AgentResult<Vec<Content>> {
        let full_path = self.root.join(file_path);
        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => Ok(vec![Content::text(content)]),
            Err(e) => Ok(vec![Content::text(format!("错误：读取文件失败 - {}", e))]),
        }
    }

    /// Send an HTTP request and report status, headers, and a capped body
    /// preview as a JSON document.
    async fn send_http_request(
        &self,
        method: &str,
        url: &str,
        headers: Option<&Value>,
        body: Option<&Value>,
    ) -> AgentResult<Vec<Content>> {
        let method = match reqwest::Method::from_bytes(method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                return Ok(vec![Content::text(format!("错误：请求失败 - {}", e))]);
            }
        };

        let mut request = self.client.request(method, url);
        if let Some(Value::Object(map)) = headers {
            for (name, value) in map {
                let Some(value) = value.as_str() else {
                    return Ok(vec![Content::text(format!(
                        "错误：请求失败 - 请求头 {} 的值必须是字符串",
                        name
                    ))]);
                };
                request = request.header(name, value);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Ok(vec![Content::text(format!("错误：请求失败 - {}", e))]);
            }
        };

        let status_code = response.status().as_u16();
        let mut header_map = serde_json::Map::new();
        for (name, value) in response.headers() {
            header_map.insert(
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).to_string()),
            );
        }

        let body_text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Ok(vec![Content::text(format!("错误：请求失败 - {}", e))]);
            }
        };
        // char-based, not byte-based: the cut must never split a UTF-8 sequence
        let preview: String = body_text.chars().take(BODY_PREVIEW_CHARS).collect();

        let report = json!({
            "status_code": status_code,
            "headers": Value::Object(header_map),
            "body": preview,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => Ok(vec![Content::text(text)]),
            Err(e) => Ok(vec![Content::text(format!("错误：请求失败 - {}", e))]),
        }
    }

    /// List the entry names in a directory, one per line, sorted so that
    /// repeated calls over an unchanged tree give identical output.
    async fn list_files(&self, directory: Option<&str>) -> AgentResult<Vec<Content>> {
        let target_dir = match directory {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        };

        let mut entries = match tokio::fs::read_dir(&target_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                return Ok(vec![Content::text(format!("错误：无法列出目录 - {}", e))]);
            }
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
                Ok(None) => break,
                Err(e) => {
                    return Ok(vec![Content::text(format!("错误：无法列出目录 - {}", e))]);
                }
            }
        }
        names.sort();

        Ok(vec![Content::text(names.join("\n"))])
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> AgentResult<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AgentError::InvalidParameters(format!("Missing required parameter: {}", key)))
}

fn optional_str<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(|v| v.as_str())
}

#[async_trait]
impl System for ApiTestSystem {
    fn name(&self) -> &str {
        "ApiTestSystem"
    }

    fn description(&self) -> &str {
        "Generates and runs pytest suites against APIs described by Swagger documents"
    }

    fn instructions(&self) -> &str {
        API_TEST_INSTRUCTIONS
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        match tool_call.name.as_str() {
            "read_swagger" => {
                let file_path = required_str(&tool_call.arguments, "file_path")?;
                self.read_swagger(file_path).await
            }
            "write_test_file" => {
                let file_name = required_str(&tool_call.arguments, "file_name")?;
                let content = required_str(&tool_call.arguments, "content")?;
                self.write_test_file(file_name, content).await
            }
            "run_pytest" => {
                let test_file = optional_str(&tool_call.arguments, "test_file");
                self.run_pytest(test_file).await
            }
            "read_file" => {
                let file_path = required_str(&tool_call.arguments, "file_path")?;
                self.read_file(file_path).await
            }
            "send_http_request" => {
                let method = required_str(&tool_call.arguments, "method")?;
                let url = required_str(&tool_call.arguments, "url")?;
                let headers = tool_call.arguments.get("headers");
                let body = tool_call.arguments.get("body");
                self.send_http_request(method, url, headers, body).await
            }
            "list_files" => {
                let directory = optional_str(&tool_call.arguments, "directory");
                self.list_files(directory).await
            }
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn get_system() -> (ApiTestSystem, TempDir) {
        let dir = TempDir::new().unwrap();
        let system = ApiTestSystem::new(dir.path().to_path_buf()).unwrap();
        (system, dir)
    }

    fn text_of(contents: &[Content]) -> &str {
        contents[0].as_text().unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (system, _dir) = get_system();
        let content = "import requests\n\ndef test_一切正常():\n    assert True\n";

        let written = system
            .call(ToolCall::new(
                "write_test_file",
                serde_json::json!({"file_name": "test_users.py", "content": content}),
            ))
            .await
            .unwrap();
        assert!(text_of(&written).starts_with("成功：测试文件已写入 - "));

        let read = system
            .call(ToolCall::new(
                "read_file",
                serde_json::json!({"file_path": "tests/test_users.py"}),
            ))
            .await
            .unwrap();
        assert_eq!(text_of(&read), content);
    }

    #[tokio::test]
    async fn test_read_swagger_normalizes_json() {
        let (system, dir) = get_system();
        std::fs::write(
            dir.path().join("api.json"),
            r#"{"openapi":"3.0.0","info":{"title":"宠物商店"}}"#,
        )
        .unwrap();

        let result = system
            .call(ToolCall::new(
                "read_swagger",
                serde_json::json!({"file_path": "api.json"}),
            ))
            .await
            .unwrap();

        let text = text_of(&result);
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["info"]["title"], "宠物商店");
        // pretty-printed, not the original compact form
        assert!(text.contains('\n'));
    }

    #[tokio::test]
    async fn test_read_swagger_normalizes_yaml() {
        let (system, dir) = get_system();
        std::fs::write(
            dir.path().join("api.yaml"),
            "openapi: 3.0.0\ninfo:\n  title: Petstore\n",
        )
        .unwrap();

        let result = system
            .call(ToolCall::new(
                "read_swagger",
                serde_json::json!({"file_path": "api.yaml"}),
            ))
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(parsed["openapi"], "3.0.0");
        assert_eq!(parsed["info"]["title"], "Petstore");
    }

    #[tokio::test]
    async fn test_read_swagger_missing_file() {
        let (system, _dir) = get_system();

        let result = system
            .call(ToolCall::new(
                "read_swagger",
                serde_json::json!({"file_path": "swagger/missing.json"}),
            ))
            .await
            .unwrap();

        assert!(text_of(&result).starts_with("错误：文件不存在 - "));
    }

    #[tokio::test]
    async fn test_read_swagger_malformed_json() {
        let (system, dir) = get_system();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let result = system
            .call(ToolCall::new(
                "read_swagger",
                serde_json::json!({"file_path": "broken.json"}),
            ))
            .await
            .unwrap();

        assert!(text_of(&result).starts_with("错误：读取文件失败 - "));
    }

    #[tokio::test]
    async fn test_list_files_sorted_and_stable() {
        let (system, dir) = get_system();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();

        let first = system
            .call(ToolCall::new("list_files", serde_json::json!({})))
            .await
            .unwrap();
        let second = system
            .call(ToolCall::new("list_files", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(text_of(&first), "a.txt\nb.txt\nc.txt");
        assert_eq!(text_of(&first), text_of(&second));
    }

    #[tokio::test]
    async fn test_list_files_missing_directory() {
        let (system, _dir) = get_system();

        let result = system
            .call(ToolCall::new(
                "list_files",
                serde_json::json!({"directory": "no_such_dir"}),
            ))
            .await
            .unwrap();

        assert!(text_of(&result).starts_with("错误：无法列出目录 - "));
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let (system, _dir) = get_system();

        let error = system
            .call(ToolCall::new("read_swagger", serde_json::json!({})))
            .await
            .unwrap_err();

        assert!(matches!(error, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool_name() {
        let (system, _dir) = get_system();

        let error = system
            .call(ToolCall::new("delete_everything", serde_json::json!({})))
            .await
            .unwrap_err();

        assert!(matches!(error, AgentError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_run_pytest_with_substitute_runner() {
        let (system, _dir) = get_system();
        let system = system.with_runner("echo");

        let result = system
            .call(ToolCall::new("run_pytest", serde_json::json!({})))
            .await
            .unwrap();

        // echo prints the target path plus the pytest flags
        let text = text_of(&result);
        assert!(text.contains("--tb=short"));
    }

    #[tokio::test]
    async fn test_run_pytest_runner_not_installed() {
        let (system, _dir) = get_system();
        let system = system.with_runner("definitely-not-a-real-binary-4127");

        let result = system
            .call(ToolCall::new("run_pytest", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(text_of(&result), "错误：pytest 未安装，请运行 pip install pytest");
    }

    #[tokio::test]
    async fn test_send_http_request_reports_status_and_body() {
        let (system, _dir) = get_system();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pets"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"name":"旺财"}]"#))
            .mount(&server)
            .await;

        let result = system
            .call(ToolCall::new(
                "send_http_request",
                serde_json::json!({"method": "get", "url": format!("{}/pets", server.uri())}),
            ))
            .await
            .unwrap();

        let report: Value = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(report["status_code"], 200);
        assert!(report["body"].as_str().unwrap().contains("旺财"));
    }

    #[tokio::test]
    async fn test_send_http_request_body_preview_is_capped() {
        let (system, _dir) = get_system();
        let server = MockServer::start().await;
        // multi-byte characters stress the cut point
        let long_body = "长".repeat(3000);
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_body))
            .mount(&server)
            .await;

        let result = system
            .call(ToolCall::new(
                "send_http_request",
                serde_json::json!({"method": "GET", "url": format!("{}/big", server.uri())}),
            ))
            .await
            .unwrap();

        let report: Value = serde_json::from_str(text_of(&result)).unwrap();
        assert_eq!(report["body"].as_str().unwrap().chars().count(), 2000);
    }

    #[tokio::test]
    async fn test_send_http_request_rejects_non_string_header_value() {
        let (system, _dir) = get_system();

        let result = system
            .call(ToolCall::new(
                "send_http_request",
                serde_json::json!({
                    "method": "GET",
                    "url": "http://127.0.0.1:1/unused",
                    "headers": {"X-Retry-Count": 3}
                }),
            ))
            .await
            .unwrap();

        let text = text_of(&result);
        assert!(text.starts_with("错误：请求失败 - "));
        assert!(text.contains("X-Retry-Count"));
    }

    #[tokio::test]
    async fn test_send_http_request_connection_failure() {
        let (system, _dir) = get_system();

        let result = system
            .call(ToolCall::new(
                "send_http_request",
                serde_json::json!({"method": "GET", "url": "http://127.0.0.1:1/unreachable"}),
            ))
            .await
            .unwrap();

        assert!(text_of(&result).starts_with("错误：请求失败 - "));
    }
}
