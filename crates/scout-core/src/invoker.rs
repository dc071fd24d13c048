//! Tool execution with timeouts
//!
//! Every tool body runs on its own task under a deadline. Errors, panics and
//! timeouts come back as a failed `ToolResult`; only an unknown tool name is
//! returned as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::tool::{ToolError, ToolRegistry, ToolResult};

/// One executed tool call
#[derive(Clone, Debug)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub input: String,
    pub result: ToolResult,
    pub duration_ms: u64,
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<anyhow::Result<String>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run one tool against one input
    pub async fn invoke(
        &self,
        name: &str,
        input: &str,
        timeout: Duration,
    ) -> Result<ToolResult, ToolError> {
        let tool = self.registry.get(name)?;
        let input = input.to_string();

        let mut task = AbortOnDrop(tokio::spawn(async move { tool.invoke(&input).await }));

        let result = match tokio::time::timeout(timeout, &mut task.0).await {
            Ok(Ok(Ok(output))) => ToolResult::success(output),
            Ok(Ok(Err(e))) => {
                warn!("Tool {} failed: {:#}", name, e);
                ToolResult::failure(ToolError::Runtime(format!("{:#}", e)).to_string())
            }
            Ok(Err(join_err)) => {
                warn!("Tool {} panicked: {}", name, join_err);
                ToolResult::failure(ToolError::Runtime(format!("tool panicked: {}", join_err)).to_string())
            }
            Err(_) => {
                warn!("Tool {} timed out after {:?}", name, timeout);
                ToolResult::failure(ToolError::Timeout.to_string())
            }
        };

        Ok(result)
    }

    /// Like `invoke`, also measuring how long the call took
    pub async fn invoke_recorded(
        &self,
        name: &str,
        input: &str,
        timeout: Duration,
    ) -> Result<ToolCallRecord, ToolError> {
        let started = Instant::now();
        let result = self.invoke(name, input, timeout).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        debug!(
            "Tool {} finished in {}ms (ok={})",
            name, duration_ms, result.ok
        );

        Ok(ToolCallRecord {
            tool_name: name.to_string(),
            input: input.to_string(),
            result,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tests::echo;
    use crate::tool::Tool;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn invoke(&self, _input: &str) -> Result<String> {
            Err(anyhow::anyhow!("upstream returned 503"))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "panic"
        }
        fn description(&self) -> &str {
            "Panics"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn invoke(&self, _input: &str) -> Result<String> {
            panic!("boom");
        }
    }

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn description(&self) -> &str {
            "Sleeps far longer than any timeout"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        async fn invoke(&self, _input: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("woke up".to_string())
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(echo("echo")).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.register(Arc::new(PanickingTool)).unwrap();
        registry.register(Arc::new(SleepyTool)).unwrap();
        ToolInvoker::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_success() {
        let result = invoker()
            .invoke("echo", "hi", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::success("hi"));
    }

    #[tokio::test]
    async fn test_runtime_error_becomes_text() {
        let result = invoker()
            .invoke("fail", "", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.output, "upstream returned 503");
    }

    #[tokio::test]
    async fn test_panic_becomes_text() {
        let result = invoker()
            .invoke("panic", "", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!result.ok);
        assert!(result.output.starts_with("tool panicked"));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let started = Instant::now();
        let result = invoker()
            .invoke("sleepy", "", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(result, ToolResult::failure("tool timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unknown_tool_propagates() {
        let err = invoker()
            .invoke("nope", "", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("nope".to_string()));
    }

    #[tokio::test]
    async fn test_invoke_recorded() {
        let record = invoker()
            .invoke_recorded("echo", "hello", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(record.tool_name, "echo");
        assert_eq!(record.input, "hello");
        assert!(record.result.ok);
    }
}
