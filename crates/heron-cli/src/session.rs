use anyhow::Result;
use console::style;
use futures::StreamExt;

use crate::prompt::{InputType, Prompt};
use heron::agent::Agent;
use heron::errors::AgentError;
use heron::models::message::Message;
use heron::models::role::Role;

pub struct Session<'a> {
    agent: Box<Agent>,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Session<'a> {
    pub fn new(agent: Box<Agent>, prompt: Box<impl Prompt + 'a>) -> Self {
        Session { agent, prompt }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.agent_ready();

        loop {
            let input = self.prompt.get_input()?;
            let content = match input.input_type {
                InputType::Message => match input.content {
                    Some(content) => content,
                    None => continue,
                },
                InputType::Exit => break,
                InputType::AskAgain => continue,
            };

            // Each instruction starts from a single seed message; nothing
            // from a previous run is carried over.
            let mut messages = vec![Message::user().with_text(&content)];

            self.prompt.show_busy();
            let result = self.agent_process_messages(&mut messages).await;
            self.prompt.hide_busy();
            if let Err(e) = result {
                eprintln!("Error: {}", e);
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Run a single instruction to completion and exit. Used for scripted
    /// invocations where no terminal interaction is wanted. An endpoint
    /// failure propagates so the process exits non-zero.
    pub async fn headless_start(&mut self, initial_message: String) -> Result<()> {
        let mut messages = vec![Message::user().with_text(&initial_message)];
        self.agent_process_messages(&mut messages).await
    }

    async fn agent_process_messages(&mut self, messages: &mut Vec<Message>) -> Result<()> {
        let mut stream = self.agent.reply(messages).await?;

        let mut turn = 0;
        while let Some(response) = stream.next().await {
            match response {
                Ok(step) => {
                    if step.message.role == Role::Assistant {
                        turn += 1;
                        println!("{}", style(format!("--- 第 {} 轮 ---", turn)).dim());
                        println!("状态: {}", step.stop_reason);
                    }
                    messages.push(step.message.clone());
                    self.prompt.render(Box::new(step.message));
                }
                Err(e) => {
                    return match e.downcast_ref::<AgentError>() {
                        Some(AgentError::TurnLimitExceeded(max_turns)) => {
                            println!("⚠️ 达到最大轮次 ({})，停止执行", max_turns);
                            Ok(())
                        }
                        _ => Err(e),
                    };
                }
            }
        }
        Ok(())
    }
}
