use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::agent::AgentConfig;
use crate::memory::DEFAULT_MEMORY_FILE;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    /// Location of the conversation memory file
    pub memory_file: PathBuf,

    pub context_turns: usize,
    pub max_tool_calls: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub model_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = AgentConfig::default();

        Ok(Self {
            openai_api_url: lookup("OPENAI_API_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),

            memory_file: lookup("SCOUT_MEMORY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEMORY_FILE)),

            context_turns: parse_var(&lookup, "SCOUT_CONTEXT_TURNS", defaults.context_turns)?,
            max_tool_calls: parse_var(&lookup, "SCOUT_MAX_TOOL_CALLS", defaults.max_tool_calls)?,
            model_timeout_secs: parse_var(
                &lookup,
                "SCOUT_MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )?,
            tool_timeout_secs: parse_var(
                &lookup,
                "SCOUT_TOOL_TIMEOUT_SECS",
                defaults.tool_timeout.as_secs(),
            )?,
            model_retries: parse_var(&lookup, "SCOUT_MODEL_RETRIES", defaults.model_retries)?,
        })
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            context_turns: self.context_turns,
            max_tool_calls: self.max_tool_calls,
            model_timeout: Duration::from_secs(self.model_timeout_secs),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            model_retries: self.model_retries,
            ..AgentConfig::default()
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw)),
        None => Ok(default),
    }
}
