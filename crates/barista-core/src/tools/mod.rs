//! Tool system: the capabilities the model may call
//!
//! A tool takes one string input and produces one string output. `execute`
//! reports failures as `AgentError`; `invoke` is the total wrapper the agent
//! uses, which turns errors and panics into `Error:`-prefixed text so that no
//! failure inside a tool can escape into the agent loop. The registry resolves
//! tools by exact name and bounds every call with a timeout.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::core_types::ToolCall;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;

pub mod calculator;
pub mod outlet_lookup;
pub mod product_lookup;

pub use calculator::CalculatorTool;
pub use outlet_lookup::OutletLookupTool;
pub use product_lookup::ProductLookupTool;

pub const CALCULATOR: &str = "calculator";
pub const PRODUCT_LOOKUP: &str = "product-lookup";
pub const OUTLET_LOOKUP: &str = "outlet-lookup";

/// Marker opening every failed tool result.
pub const ERROR_MARKER: &str = "Error:";

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(45);

// Core Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> ToolMetadata;

    async fn execute(&self, input: &str) -> Result<String, AgentError>;

    /// Runs the tool and always returns text, never an error or a panic.
    async fn invoke(&self, input: &str) -> String {
        let name = self.metadata().name;
        match AssertUnwindSafe(self.execute(input)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                log::warn!("Tool '{}' failed: {}", name, err);
                render_failure(&err)
            }
            Err(panic) => {
                let err = AgentError::InternalError(format!(
                    "tool '{}' crashed: {}",
                    name,
                    panic_message(panic.as_ref())
                ));
                log::error!("{}", err);
                render_failure(&err)
            }
        }
    }
}

/// Renders a failure as tool-result text.
pub fn render_failure(err: &AgentError) -> String {
    format!("{} {}", ERROR_MARKER, err)
}

pub fn is_failure(output: &str) -> bool {
    output.starts_with(ERROR_MARKER)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Tool registry for managing multiple tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.metadata().name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Metadata of every registered tool, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolMetadata> {
        let mut tools: Vec<ToolMetadata> = self.tools.values().map(|tool| tool.metadata()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Runs the named tool on `input`. Unknown names and timeouts come back as
    /// failure text like any other tool error.
    pub async fn dispatch(&self, name: &str, input: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            let err = AgentError::UnknownTool(name.to_string());
            log::warn!("{}", err);
            return render_failure(&err);
        };

        log::debug!("Dispatching '{}' with input: {}", name, input);
        match tokio::time::timeout(self.timeout, tool.invoke(input)).await {
            Ok(output) => output,
            Err(_) => {
                let err = AgentError::Timeout {
                    operation: format!("tool '{}'", name),
                    seconds: self.timeout.as_secs(),
                };
                log::warn!("{}", err);
                render_failure(&err)
            }
        }
    }

    /// Dispatches a model-issued call, answering malformed calls with failure text.
    pub async fn dispatch_call(&self, call: &ToolCall) -> String {
        match call.input() {
            Ok(input) => self.dispatch(&call.name, &input).await,
            Err(err) => {
                log::warn!("Rejected tool call {:?}: {}", call.id, err);
                render_failure(&err)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "failing".to_string(),
                description: "always fails".to_string(),
                input_schema: json!({}),
            }
        }

        async fn execute(&self, _input: &str) -> Result<String, AgentError> {
            Err(AgentError::BackendUnavailable("index not loaded".to_string()))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "panicking".to_string(),
                description: "always panics".to_string(),
                input_schema: json!({}),
            }
        }

        async fn execute(&self, input: &str) -> Result<String, AgentError> {
            panic!("bad input {}", input);
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "slow".to_string(),
                description: "never finishes in time".to_string(),
                input_schema: json!({}),
            }
        }

        async fn execute(&self, _input: &str) -> Result<String, AgentError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("done".to_string())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new().with_timeout(Duration::from_millis(50));
        registry.register_tool(Arc::new(CalculatorTool::new()));
        registry.register_tool(Arc::new(FailingTool));
        registry.register_tool(Arc::new(PanickingTool));
        registry.register_tool(Arc::new(SlowTool));
        registry
    }

    #[tokio::test]
    async fn test_dispatch_by_exact_name() {
        let registry = registry();
        assert_eq!(registry.dispatch("calculator", "2*5+10").await, "Result: 20");
        let output = registry.dispatch("Calculator", "1+1").await;
        assert!(is_failure(&output));
        assert!(output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_failures_become_text() {
        let registry = registry();

        let output = registry.dispatch("failing", "anything").await;
        assert_eq!(output, "Error: Backend unavailable: index not loaded");

        let output = registry.dispatch("panicking", "x").await;
        assert!(is_failure(&output));
        assert!(output.contains("bad input x"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_distinctly() {
        let registry = registry();
        let output = registry.dispatch("slow", "x").await;
        assert!(output.starts_with("Error: Timed out"));
    }

    #[tokio::test]
    async fn test_dispatch_call_rejects_malformed_arguments() {
        let registry = registry();
        let call = ToolCall {
            id: Some("call_1".to_string()),
            name: "calculator".to_string(),
            arguments: json!([1, 2]),
        };
        let output = registry.dispatch_call(&call).await;
        assert!(output.starts_with("Error: Malformed tool call"));

        let call = ToolCall {
            id: Some("call_2".to_string()),
            name: "calculator".to_string(),
            arguments: json!({"expression": "7/2"}),
        };
        assert_eq!(registry.dispatch_call(&call).await, "Result: 3.5");

        let call = ToolCall {
            id: Some("call_3".to_string()),
            name: "calculator".to_string(),
            arguments: json!({"expression": 6}),
        };
        assert_eq!(registry.dispatch_call(&call).await, "Result: 6");

        let call = ToolCall {
            id: Some("call_4".to_string()),
            name: "calculator".to_string(),
            arguments: json!("\"2^3\""),
        };
        assert_eq!(registry.dispatch_call(&call).await, "Result: 8");
    }

    #[test]
    fn test_list_tools_sorted() {
        let names: Vec<String> = registry().list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["calculator", "failing", "panicking", "slow"]);
    }
}
