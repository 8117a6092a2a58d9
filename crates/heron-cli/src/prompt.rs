use anyhow::Result;
use heron::models::message::Message;

pub mod cliclack;

pub trait Prompt {
    fn render(&mut self, message: Box<Message>);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&self);
    fn close(&self);
    fn agent_ready(&self) {
        println!();
        println!("🤖 接口自动化测试 Agent");
        println!();
        println!("可用指令示例：");
        println!("1. 读取 swagger/petstore.json，为所有接口生成测试用例");
        println!("2. 运行测试并修复失败的用例");
        println!("3. 列出当前的测试文件");
        println!();
        println!("输入 'quit' 退出");
        println!();
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Optional content as sometimes the user may be issuing a command eg. (Exit)
}

pub enum InputType {
    AskAgain, // Ask the user for input again. Control flow command.
    Message,  // User sent a message
    Exit,     // User wants to exit the session
}

/// Map one line of user input to a session action. Blank lines re-prompt;
/// quit, exit, and q (any case) end the session.
pub fn classify_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input {
            input_type: InputType::AskAgain,
            content: None,
        };
    }
    if trimmed.eq_ignore_ascii_case("quit")
        || trimmed.eq_ignore_ascii_case("exit")
        || trimmed.eq_ignore_ascii_case("q")
    {
        return Input {
            input_type: InputType::Exit,
            content: None,
        };
    }
    Input {
        input_type: InputType::Message,
        content: Some(trimmed.to_string()),
    }
}
