use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::{input, spinner};
use heron::models::message::{Message, MessageContent};

use super::{classify_input, Input, Prompt};

const PREVIEW_CHARS: usize = 300;

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt { spinner: spinner() }
    }
}

/// Shorten long tool payloads for display. The full text stays in the
/// message history; only the rendering is cut.
fn truncate_preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

fn print_tool_request(content: &str, tool_name: &str) {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes()).name(format!("🔧 调用工具: {}", tool_name)),
        )
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap_or_default();
}

fn print_tool_response(content: &str, language: &str) {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name("结果:"))
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap_or_default();
}

fn print(content: &str) {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .unwrap_or_default();
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, message: Box<Message>) {
        for message_content in &message.content {
            match message_content {
                MessageContent::Text(text) => print(&text.text),
                MessageContent::ToolRequest(tool_request) => match &tool_request.tool_call {
                    Ok(call) => {
                        let arguments = serde_json::to_string_pretty(&call.arguments)
                            .unwrap_or_else(|_| call.arguments.to_string());
                        print_tool_request(&truncate_preview(&arguments), &call.name);
                    }
                    Err(e) => print(&e.to_string()),
                },
                MessageContent::ToolResponse(tool_response) => match &tool_response.tool_result {
                    Ok(_) => {
                        let text = message_content
                            .as_tool_response_text()
                            .unwrap_or_default();
                        let language = if text.starts_with('{') { "JSON" } else { "Markdown" };
                        print_tool_response(&truncate_preview(&text), language);
                    }
                    Err(e) => print(&e.to_string()),
                },
            }
        }

        println!();
        let _ = io::stdout().flush();
    }

    fn show_busy(&mut self) {
        self.spinner = spinner();
        self.spinner.start("等待回复");
    }

    fn hide_busy(&self) {
        self.spinner.stop("");
    }

    fn get_input(&mut self) -> Result<Input> {
        let line: String = input("👤 请输入指令:").placeholder("").interact()?;
        Ok(classify_input(&line))
    }

    fn close(&self) {
        println!("再见！");
    }
}
