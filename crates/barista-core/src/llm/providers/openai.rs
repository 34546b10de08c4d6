use crate::config::LlmConfig;
use crate::core_types::{LLMResponse, Message, Role, ToolCall, Usage};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use serde_json::{json, Value};

/// Client for OpenAI-compatible chat-completions endpoints (OpenAI, Groq,
/// self-hosted gateways).
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: super::OPENAI_API_BASE.to_string(),
            model,
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_api_base(mut self, api_base: String) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request_body(&self, messages: &[Message], tools: Option<&[ToolMetadata]>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": self.format_messages(messages),
            "temperature": self.temperature,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                log::debug!(
                    "Offering {} tools: {:?}",
                    tools.len(),
                    tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
                );
                let formatted_tools: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.input_schema
                            }
                        })
                    })
                    .collect();
                body["tools"] = formatted_tools.into();
                body["tool_choice"] = "auto".into();
            }
        }

        body
    }

    fn format_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut message = json!({
                    "role": self.format_role(&msg.role),
                    "content": msg.content
                });

                if let Role::Tool = msg.role {
                    if let Some(tool_call_id) = &msg.tool_call_id {
                        message["tool_call_id"] = json!(tool_call_id);
                    }
                }

                if let Role::Assistant = msg.role {
                    if let Some(tool_calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
                        let formatted_tool_calls: Vec<Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id.clone().unwrap_or_default(),
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": encode_arguments(&tc.arguments)
                                    }
                                })
                            })
                            .collect();
                        message["tool_calls"] = json!(formatted_tool_calls);
                        if msg.content.is_empty() {
                            message["content"] = Value::Null;
                        }
                    }
                }

                message
            })
            .collect()
    }

    fn format_role(&self, role: &Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

// Arguments that failed to parse are kept as the raw string the model sent.
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl LLM for OpenAIClient {
    async fn generate(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request_body(&messages, tools.as_deref());

        log::debug!("Chat completion request to {} with {} messages", url, messages.len());
        for (i, msg) in messages.iter().enumerate() {
            log::debug!(
                "  Message #{}: role={:?}, content={}, tool_call_id={:?}",
                i,
                msg.role,
                msg.content,
                msg.tool_call_id
            );
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::UpstreamModel(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::UpstreamModel(format!("Failed to read response: {}", e)))?;

        log::debug!("Chat completion response ({}): {}", status, response_text);

        if !status.is_success() {
            return Err(AgentError::UpstreamModel(format!(
                "API request failed with status {}: {}",
                status, response_text
            )));
        }

        let response_json: Value = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::UpstreamModel(format!("Invalid JSON response: {}", e)))?;

        parse_response(response_json)
    }
}

fn parse_response(response: Value) -> Result<LLMResponse, AgentError> {
    let choice = response["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| AgentError::UpstreamModel("No choices in response".to_string()))?;
    let message = &choice["message"];

    let content = message["content"]
        .as_str()
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty());

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    if content.is_none() && tool_calls.is_empty() {
        return Err(AgentError::UpstreamModel(
            "Response has neither content nor tool calls".to_string(),
        ));
    }

    let usage = serde_json::from_value::<Usage>(response["usage"].clone()).ok();

    Ok(LLMResponse {
        content,
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        finish_reason: choice["finish_reason"].as_str().map(|s| s.to_string()),
        usage,
    })
}

fn parse_tool_call(call: &Value) -> Option<ToolCall> {
    let function = call["function"].as_object()?;
    let name = function.get("name")?.as_str()?.to_string();
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Tool call '{}' has unparseable arguments: {}", name, e);
                Value::String(raw.clone())
            }
        },
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Some(ToolCall {
        id: call["id"].as_str().map(|s| s.to_string()),
        name,
        arguments,
    })
}

/// Create an OpenAI-compatible client from configuration
pub fn create_client(config: &LlmConfig, api_base: &str) -> Result<Arc<dyn LLM>, AgentError> {
    let api_key = config
        .auth
        .api_key
        .clone()
        .or_else(|| {
            config
                .auth
                .api_key_env
                .as_ref()
                .and_then(|env_var| std::env::var(env_var).ok())
        })
        .ok_or_else(|| {
            AgentError::ConfigError(format!(
                "No API key found for {}. Set llm.auth.api_key or the {} environment variable",
                api_base,
                config.auth.api_key_env.as_deref().unwrap_or("configured")
            ))
        })?;

    let mut client = OpenAIClient::new(api_key, config.model.clone())
        .with_api_base(api_base.to_string())
        .with_temperature(config.parameters.temperature);
    if config.parameters.max_tokens > 0 {
        client = client.with_max_tokens(config.parameters.max_tokens);
    }

    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OpenAIClient::new("test-key".to_string(), "llama-3.3-70b-versatile".to_string())
            .with_api_base("https://api.groq.com/openai/v1/".to_string())
            .with_max_tokens(1000);

        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(client.temperature, 0.0);
        assert_eq!(client.max_tokens, Some(1000));
    }

    #[test]
    fn test_message_formatting() {
        let client = OpenAIClient::new("test-key".to_string(), "model".to_string());
        let call = ToolCall {
            id: Some("call_1".to_string()),
            name: "calculator".to_string(),
            arguments: json!({"expression": "2+2"}),
        };
        let messages = vec![
            Message::system("You are a helpful assistant."),
            Message::user("What is 2+2?"),
            Message::assistant_with_calls("", vec![call]),
            Message::tool_result("call_1", "Result: 4"),
        ];

        let formatted = client.format_messages(&messages);
        assert_eq!(formatted.len(), 4);
        assert_eq!(formatted[0]["role"], "system");
        assert_eq!(formatted[1]["content"], "What is 2+2?");
        assert_eq!(formatted[2]["content"], Value::Null);
        assert_eq!(formatted[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            formatted[2]["tool_calls"][0]["function"]["arguments"],
            "{\"expression\":\"2+2\"}"
        );
        assert_eq!(formatted[3]["role"], "tool");
        assert_eq!(formatted[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_request_body_offers_tools() {
        let client = OpenAIClient::new("k".to_string(), "m".to_string());
        let tools = vec![ToolMetadata {
            name: "calculator".to_string(),
            description: "math".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let body = client.build_request_body(&[Message::user("hi")], Some(&tools));
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "calculator");
        assert_eq!(body["temperature"], 0.0);

        let body = client.build_request_body(&[Message::user("hi")], None);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let response = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "calculator", "arguments": "{\"expression\": \"1+1\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "outlet-lookup", "arguments": "{not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let parsed = parse_response(response).unwrap();
        assert!(parsed.content.is_none());
        let calls = parsed.tool_calls.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments["expression"], "1+1");
        // kept raw so the agent can answer the call with an error
        assert_eq!(calls[1].arguments, Value::String("{not json".to_string()));
        assert_eq!(parsed.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_response_text_only() {
        let response = json!({"choices": [{"message": {"content": "Hello!"}}]});
        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Hello!"));
        assert!(parsed.tool_calls.is_none());
    }

    #[test]
    fn test_parse_response_empty() {
        let response = json!({"choices": []});
        assert!(matches!(parse_response(response), Err(AgentError::UpstreamModel(_))));
        let response = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(parse_response(response), Err(AgentError::UpstreamModel(_))));
    }
}
