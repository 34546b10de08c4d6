//! Arithmetic tool backed by the restricted expression evaluator

use crate::errors::AgentError;
use crate::evaluator::{self, format_number};
use crate::llm::ToolMetadata;
use crate::tools::{Tool, CALCULATOR};
use async_trait::async_trait;
use serde_json::json;

pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: CALCULATOR.to_string(),
            description: "A useful tool for performing simple arithmetic operations. Input must be a mathematical expression string, e.g., '15*2 - 4'.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Arithmetic expression using numbers, + - * /, ^ or ** for powers, and parentheses"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, input: &str) -> Result<String, AgentError> {
        let value = evaluator::evaluate(input)?;
        Ok(format!("Result: {}", format_number(value)))
    }
}
