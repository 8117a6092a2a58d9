use anyhow::{Context, Result};
use std::env;

pub const ANTHROPIC_DEFAULT_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl AnthropicProviderConfig {
    /// Build a config from environment variables, falling back to the
    /// public endpoint and the default model.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable must be set")?;

        Ok(Self {
            host: env::var("ANTHROPIC_HOST").unwrap_or_else(|_| ANTHROPIC_DEFAULT_HOST.to_string()),
            api_key,
            model: env::var("HERON_MODEL").unwrap_or_else(|_| ANTHROPIC_DEFAULT_MODEL.to_string()),
            temperature: None,
            max_tokens: Some(4096),
        })
    }
}
