//! Scout agent loop
//!
//! One `run_turn` walks a small state machine:
//!
//! ```text
//! AwaitingDecision -> (ToolCall)* -> ComposingAnswer -> Done
//! ```
//!
//! The model either answers or asks for tools. Requested tools run
//! concurrently and their results are appended to the running context before
//! the next decision. Once the tool budget is spent the model is asked one last
//! time, with no tools on offer, to answer from what it has.
//!
//! Every completed turn appends exactly one user and one assistant turn to
//! memory in a single write. A cancelled turn appends nothing.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::invoker::{ToolCallRecord, ToolInvoker};
use crate::memory::{MemoryStore, Turn};
use crate::model::{Decision, LanguageModel, ModelError, ToolCall};
use crate::retry::retry_backoff_delay;
use crate::tool::{Tool, ToolError, ToolRegistry, ToolResult};

/// Fixed preamble placed before the conversation history
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant with access to conversation history.
Always remember and reference information the user has shared with you in previous messages.
If the user mentions their city, location, or any personal information, remember it for future questions.
When answering questions about 'my city' or 'there', use the information they previously provided.";

/// Answer text when the model could not be reached
pub const MODEL_FAILURE_ANSWER: &str = "unable to complete request";

/// Answer text when the turn was cancelled
pub const CANCELLED_ANSWER: &str = "request cancelled";

/// Answer text when the model returned nothing usable
pub const EMPTY_ANSWER: &str = "I apologize, but I wasn't able to generate a response.";

const BUDGET_EXHAUSTED_PROMPT: &str = "=== TOOL BUDGET EXHAUSTED ===
No more tools can be called for this question. Answer now using only the information gathered above.";

/// Knobs for the agent loop
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Number of most recent turns folded into the context
    pub context_turns: usize,
    /// Maximum tool calls per turn
    pub max_tool_calls: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    /// Retries after the first failed model call
    pub model_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            context_turns: 6,
            max_tool_calls: 5,
            model_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(5),
            model_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// What a driver gets back from a turn
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub answer: String,
    /// Tools invoked this turn, in completion order
    pub tools_used: Vec<String>,
}

/// Turn was cancelled at a suspension point
struct Cancelled {
    tools_used: Vec<String>,
}

/// A dispatched tool call and whether it reached a registered tool
struct Dispatched {
    record: ToolCallRecord,
    invoked: bool,
}

pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    invoker: ToolInvoker,
    memory: MemoryStore,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: ToolRegistry,
        memory: MemoryStore,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            invoker: ToolInvoker::new(Arc::new(registry)),
            memory,
            config,
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.invoker.registry()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one conversational turn
    pub async fn run_turn(&mut self, query: &str) -> TurnOutcome {
        self.run_turn_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Run one turn, aborting at the next model or tool boundary once `cancel` fires
    pub async fn run_turn_with_cancel(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        info!("=== TURN START ===");
        info!("Query: {}", query);

        let user_turn = Turn::user(query);

        let outcome = match self.execute(query, cancel).await {
            Ok(outcome) => outcome,
            Err(cancelled) => {
                warn!("Turn cancelled; memory left untouched");
                return TurnOutcome {
                    answer: CANCELLED_ANSWER.to_string(),
                    tools_used: cancelled.tools_used,
                };
            }
        };

        let assistant_turn = Turn::assistant(outcome.answer.clone(), outcome.tools_used.clone());
        if let Err(e) = self.memory.append_pair(user_turn, assistant_turn) {
            error!("Failed to persist memory (will retry on next turn): {}", e);
        }

        info!("=== TURN DONE ===");
        info!("Tools used: {:?}", outcome.tools_used);
        outcome
    }

    /// Context for the first decision: preamble, recent history, query
    fn build_context(&self, query: &str) -> String {
        let history = self.memory.get_context(self.config.context_turns);
        if history.is_empty() {
            format!("{}\n\nQuestion: {}", SYSTEM_PREAMBLE, query)
        } else {
            format!(
                "{}\n\nConversation History:\n{}\n\nCurrent Question: {}",
                SYSTEM_PREAMBLE, history, query
            )
        }
    }

    async fn execute(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, Cancelled> {
        let mut context = self.build_context(query);
        let mut tools_used: Vec<String> = Vec::new();
        let mut calls_made = 0usize;
        let tools = self.invoker.registry().list();
        let max_calls = self.config.max_tool_calls;

        // AwaitingDecision / ToolCall
        let answer = loop {
            if calls_made >= max_calls {
                info!("Tool budget of {} calls exhausted", max_calls);
                break self.compose_after_budget(&context, &tools_used, cancel).await?;
            }

            debug!("Awaiting decision (calls made: {})", calls_made);
            let decision = match self
                .decide_or_cancel(&context, &tools, &tools_used, cancel)
                .await
            {
                Ok(decision) => decision?,
                Err(e) => {
                    error!("Model call failed after retries: {}", e);
                    break MODEL_FAILURE_ANSWER.to_string();
                }
            };

            match decision {
                Decision::Answer(text) => break text,
                Decision::ToolCalls(calls) if calls.is_empty() => {
                    warn!("Model requested an empty tool call list");
                    break String::new();
                }
                Decision::ToolCalls(mut calls) => {
                    let remaining = max_calls - calls_made;
                    if calls.len() > remaining {
                        warn!(
                            "Model requested {} tool calls, only {} left in budget",
                            calls.len(),
                            remaining
                        );
                        calls.truncate(remaining);
                    }

                    let dispatched = self
                        .run_tool_calls(calls, cancel)
                        .await
                        .map_err(|mut c| {
                            tools_used.append(&mut c.tools_used);
                            Cancelled {
                                tools_used: std::mem::take(&mut tools_used),
                            }
                        })?;

                    for d in dispatched {
                        calls_made += 1;
                        if d.invoked {
                            tools_used.push(d.record.tool_name.clone());
                        }
                        context.push_str(&format_tool_result(&d.record));
                    }
                }
            }
        };

        // ComposingAnswer
        let answer = if answer.trim().is_empty() {
            warn!("Agent produced no answer");
            EMPTY_ANSWER.to_string()
        } else {
            answer
        };

        Ok(TurnOutcome { answer, tools_used })
    }

    /// Final decision with tools withheld, noting the spent budget
    async fn compose_after_budget(
        &self,
        context: &str,
        tools_used: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, Cancelled> {
        let context = format!("{}\n\n{}", context, BUDGET_EXHAUSTED_PROMPT);

        let partial = match self.decide_or_cancel(&context, &[], tools_used, cancel).await {
            Ok(Ok(Decision::Answer(text))) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!("Model did not answer after tool budget was exhausted");
                EMPTY_ANSWER.to_string()
            }
            Ok(Err(cancelled)) => return Err(cancelled),
            Err(e) => {
                error!("Model call failed after retries: {}", e);
                MODEL_FAILURE_ANSWER.to_string()
            }
        };

        Ok(format!(
            "{}\n\n(Note: the tool budget of {} calls was reached and no further tools could be called.)",
            partial, self.config.max_tool_calls
        ))
    }

    /// Model decision raced against cancellation.
    ///
    /// Outer `Err` is a model failure after retries; inner `Err` is cancellation
    /// carrying the tools already used this turn.
    async fn decide_or_cancel(
        &self,
        context: &str,
        tools: &[Arc<dyn Tool>],
        tools_used: &[String],
        cancel: &CancellationToken,
    ) -> Result<Result<Decision, Cancelled>, ModelError> {
        let cancelled = || Cancelled {
            tools_used: tools_used.to_vec(),
        };
        if cancel.is_cancelled() {
            return Ok(Err(cancelled()));
        }

        tokio::select! {
            _ = cancel.cancelled() => Ok(Err(cancelled())),
            result = self.decide(context, tools) => result.map(Ok),
        }
    }

    /// One decision with timeout and retry
    async fn decide(
        &self,
        context: &str,
        tools: &[Arc<dyn Tool>],
    ) -> Result<Decision, ModelError> {
        info!("=== LLM REQUEST ===");
        info!("Tools offered: {}", tools.len());
        debug!("Context:\n{}", context);

        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(
                self.config.model_timeout,
                self.model.decide(context, tools),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ModelError::Timeout(self.config.model_timeout)),
            };

            match result {
                Ok(decision) => {
                    info!("=== LLM RESPONSE ===");
                    info!("Decision: {:?}", decision);
                    return Ok(decision);
                }
                Err(e) if attempt < self.config.model_retries => {
                    let delay = retry_backoff_delay(self.config.retry_base_delay, attempt);
                    warn!(
                        "Model call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.config.model_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run requested tools concurrently, collecting results as they complete
    async fn run_tool_calls(
        &self,
        calls: Vec<ToolCall>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dispatched>, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled {
                tools_used: Vec::new(),
            });
        }

        let mut pending: FuturesUnordered<_> =
            calls.into_iter().map(|call| self.dispatch(call)).collect();
        let mut done = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Cancelled {
                        tools_used: done
                            .iter()
                            .filter(|d: &&Dispatched| d.invoked)
                            .map(|d| d.record.tool_name.clone())
                            .collect(),
                    });
                }
                next = pending.next() => match next {
                    Some(dispatched) => done.push(dispatched),
                    None => break,
                },
            }
        }

        Ok(done)
    }

    async fn dispatch(&self, call: ToolCall) -> Dispatched {
        info!("Executing tool: {} with input: {:?}", call.name, call.input);

        match self
            .invoker
            .invoke_recorded(&call.name, &call.input, self.config.tool_timeout)
            .await
        {
            Ok(record) => Dispatched {
                record,
                invoked: true,
            },
            Err(e) => {
                if matches!(e, ToolError::UnknownTool(_)) {
                    warn!("Model requested {}", e);
                }
                Dispatched {
                    record: ToolCallRecord {
                        tool_name: call.name,
                        input: call.input,
                        result: ToolResult::failure(e.to_string()),
                        duration_ms: 0,
                    },
                    invoked: false,
                }
            }
        }
    }
}

/// Tool result block appended to the running context
fn format_tool_result(record: &ToolCallRecord) -> String {
    format!(
        "\n\n[Tool Result: {}]\nInput: {}\nStatus: {}\nOutput: {}",
        record.tool_name,
        record.input,
        if record.result.ok { "OK" } else { "ERROR" },
        record.result.output
    )
}
