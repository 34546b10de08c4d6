//! Outlet questions answered by the structured query engine

use crate::core_types::Readiness;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::outlets::OutletQa;
use crate::tools::{Tool, OUTLET_LOOKUP};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const NO_ANSWER: &str = "No answer found.";

pub struct OutletLookupTool {
    backend: Readiness<Arc<dyn OutletQa>>,
}

impl OutletLookupTool {
    pub fn new(backend: Readiness<Arc<dyn OutletQa>>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for OutletLookupTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: OUTLET_LOOKUP.to_string(),
            description: "Use this tool to answer questions about ZUS Coffee outlet locations, addresses, states, and operating hours. Input is a natural language question.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The customer's question about outlets"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: &str) -> Result<String, AgentError> {
        let backend = self.backend.get()?;
        log::info!("Outlet lookup: '{}'", input);
        let answer = backend.answer(input).await?;
        if answer.answer.trim().is_empty() {
            return Ok(NO_ANSWER.to_string());
        }
        Ok(answer.answer)
    }
}
