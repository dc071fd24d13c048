//! Language model boundary
//!
//! The agent only needs one decision per step: answer now, or call tools.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::tool::Tool;

/// A tool call requested by the model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub input: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }
}

/// Outcome of one decision step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Answer(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Decide the next step given the running context and the tools on offer.
    /// An empty `tools` slice means the model must answer.
    async fn decide(&self, context: &str, tools: &[Arc<dyn Tool>]) -> Result<Decision, ModelError>;
}
