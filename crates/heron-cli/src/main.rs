use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use heron::agent::{Agent, AgentConfig};
use heron::apitest::ApiTestSystem;
use heron::providers::anthropic::AnthropicProvider;
use heron::providers::configs::{
    AnthropicProviderConfig, ANTHROPIC_DEFAULT_HOST, ANTHROPIC_DEFAULT_MODEL,
};
use heron::weather::WeatherSystem;

mod prompt;
mod session;

use prompt::cliclack::CliclackPrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Which tool system to run the agent with
    #[arg(short, long, default_value = "api-test")]
    #[arg(value_enum)]
    system: SystemVariant,

    /// Maximum model/tool turns per instruction (defaults: api-test 15, weather 10)
    #[arg(long)]
    max_turns: Option<usize>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Anthropic API key (can also be set via ANTHROPIC_API_KEY environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// API host
    #[arg(long)]
    host: Option<String>,

    /// Project root for swagger documents and generated tests
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Run this single instruction and exit instead of starting a session
    #[arg(long)]
    message: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SystemVariant {
    ApiTest,
    Weather,
}

impl SystemVariant {
    fn default_max_turns(self) -> usize {
        match self {
            SystemVariant::ApiTest => 15,
            SystemVariant::Weather => 10,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = get_provider_config(&cli)?;
    let provider = Box::new(AnthropicProvider::new(config)?);

    let agent_config = AgentConfig {
        max_turns: cli.max_turns.unwrap_or(cli.system.default_max_turns()),
        system_prompt: None,
    };
    let mut agent = Agent::with_config(provider, agent_config);
    match cli.system {
        SystemVariant::ApiTest => {
            agent.add_system(Box::new(ApiTestSystem::new(cli.root.clone())?));
        }
        SystemVariant::Weather => {
            agent.add_system(Box::new(WeatherSystem::new()));
        }
    }

    let prompt = Box::new(CliclackPrompt::new());
    let mut session = Session::new(Box::new(agent), prompt);

    match cli.message {
        Some(message) => session.headless_start(message).await,
        None => session.start().await,
    }
}

fn get_provider_config(cli: &Cli) -> Result<AnthropicProviderConfig> {
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| env::var("ANTHROPIC_API_KEY").ok())
        .context("API key must be provided via --api-key or ANTHROPIC_API_KEY environment variable")?;

    Ok(AnthropicProviderConfig {
        host: cli
            .host
            .clone()
            .or_else(|| env::var("ANTHROPIC_HOST").ok())
            .unwrap_or_else(|| ANTHROPIC_DEFAULT_HOST.to_string()),
        api_key,
        model: cli
            .model
            .clone()
            .or_else(|| env::var("HERON_MODEL").ok())
            .unwrap_or_else(|| ANTHROPIC_DEFAULT_MODEL.to_string()),
        temperature: None,
        max_tokens: Some(4096),
    })
}
