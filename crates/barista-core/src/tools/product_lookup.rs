//! Product questions answered from the drinkware retrieval index

use crate::core_types::Readiness;
use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::rag::ProductQa;
use crate::tools::{Tool, PRODUCT_LOOKUP};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct ProductLookupTool {
    backend: Readiness<Arc<dyn ProductQa>>,
}

impl ProductLookupTool {
    pub fn new(backend: Readiness<Arc<dyn ProductQa>>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for ProductLookupTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: PRODUCT_LOOKUP.to_string(),
            description: "Use this tool to answer questions about ZUS Coffee drinkware products, such as cups, tumblers, or bottles. Input is a natural language question.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The customer's question about drinkware products"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: &str) -> Result<String, AgentError> {
        let backend = self.backend.get()?;
        log::info!("Product lookup: '{}'", input);
        let answer = backend.answer(input).await?;
        Ok(serde_json::to_string(&answer)?)
    }
}
