//! OpenAI-compatible chat completions backend
//!
//! Sends the agent context as a single user message and advertises each tool
//! as a function. Function arguments are reduced to the tool's one text input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::model::{Decision, LanguageModel, ModelError, ToolCall};
use crate::tool::Tool;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("Scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn build_request(&self, context: &str, tools: &[Arc<dyn Tool>]) -> ChatCompletionRequest {
        let tools: Vec<ChatCompletionTool> = tools
            .iter()
            .map(|t| ChatCompletionTool {
                tool_type: "function".to_string(),
                function: ChatCompletionFunction {
                    name: t.name().to_string(),
                    description: Some(t.description().to_string()),
                    parameters: Some(t.input_schema()),
                },
            })
            .collect();

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatCompletionMessage {
                role: "user".to_string(),
                content: Some(context.to_string()),
            }],
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn decide(&self, context: &str, tools: &[Arc<dyn Tool>]) -> Result<Decision, ModelError> {
        let request = self.build_request(context, tools);
        let url = self.api_url("chat/completions");

        debug!("Sending chat completion to {} ({} tools)", url, tools.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        decision_from_response(parsed, tools)
    }
}

fn decision_from_response(
    response: ChatCompletionResponse,
    tools: &[Arc<dyn Tool>],
) -> Result<Decision, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::InvalidResponse("No choices in response".to_string()))?;

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if tool_calls.is_empty() {
        return Ok(Decision::Answer(choice.message.content.unwrap_or_default()));
    }

    Ok(Decision::ToolCalls(
        tool_calls
            .into_iter()
            .map(|tc| {
                let key = input_key(tools, &tc.function.name);
                let input = extract_input(&tc.function.arguments, key.as_deref());
                ToolCall::new(tc.function.name, input)
            })
            .collect(),
    ))
}

/// First required property of the named tool's input schema
fn input_key(tools: &[Arc<dyn Tool>], name: &str) -> Option<String> {
    tools
        .iter()
        .find(|t| t.name() == name)
        .and_then(|t| t.input_schema()["required"][0].as_str().map(str::to_string))
}

/// Reduce function-call arguments to a single text input.
///
/// Reads `key` when the argument object has it. Otherwise takes the first
/// string property in key-sorted order, since `serde_json::Map` does not keep
/// insertion order. Arguments that are not an object come back as raw text.
pub(crate) fn extract_input(arguments: &str, key: Option<&str>) -> String {
    let as_text = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => key
            .and_then(|k| map.get(k))
            .map(as_text)
            .or_else(|| map.values().find_map(|v| v.as_str().map(str::to_string)))
            .or_else(|| map.values().next().map(as_text))
            .unwrap_or_default(),
        Ok(serde_json::Value::String(s)) => s,
        _ => arguments.to_string(),
    }
}

// OpenAI-compatible Chat Completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatCompletionTool>>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatCompletionFunction,
}

#[derive(Debug, Serialize)]
struct ChatCompletionFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatCompletionToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionToolCall {
    function: ChatCompletionToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
