//! Core type definitions shared by the agent loop, the tools and the model client
//!
//! Messages follow the OpenAI function-calling layout so they can be sent to any
//! compatible chat-completions endpoint without translation. A conversation is
//! append-only: the agent receives one, extends it and hands a new one back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AgentError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message carrying the tool calls the model asked for.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: Value,
}

/// Argument fields accepted as the tool input, in lookup order.
const INPUT_KEYS: [&str; 3] = ["input", "expression", "query"];

impl ToolCall {
    /// Extracts the single string input a tool takes from the model-supplied
    /// arguments.
    pub fn input(&self) -> Result<String, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::MalformedToolCall(
                "the call does not name a tool".to_string(),
            ));
        }
        match &self.arguments {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => input_from_object(&map),
                // a JSON-encoded string such as "\"2+2\""
                Ok(Value::String(inner)) => Ok(inner),
                Err(e) if raw.trim_start().starts_with('{') => Err(AgentError::MalformedToolCall(
                    format!("arguments for '{}' are not valid JSON: {}", self.name, e),
                )),
                _ => Ok(raw.clone()),
            },
            Value::Object(map) => input_from_object(map),
            other => Err(AgentError::MalformedToolCall(format!(
                "arguments for '{}' must be a string or an object, got {}",
                self.name, other
            ))),
        }
    }
}

fn input_from_object(map: &serde_json::Map<String, Value>) -> Result<String, AgentError> {
    for key in INPUT_KEYS {
        match map.get(key) {
            Some(Value::String(value)) => return Ok(value.clone()),
            Some(Value::Number(value)) => return Ok(value.to_string()),
            _ => {}
        }
    }

    let mut strings = map.values().filter_map(Value::as_str);
    match (strings.next(), strings.next()) {
        (Some(only), None) => Ok(only.to_string()),
        _ => Err(AgentError::MalformedToolCall(format!(
            "expected one of {:?} in the arguments",
            INPUT_KEYS
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Default::default()
        }
    }

    /// Tool calls requested by the model, if any.
    pub fn requested_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Ordered, append-only message history for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Prior turn as exchanged with chat clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            kind: "human".to_string(),
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            kind: "ai".to_string(),
            content: content.into(),
        }
    }
}

impl TryFrom<HistoryEntry> for Message {
    type Error = AgentError;

    fn try_from(entry: HistoryEntry) -> Result<Self, Self::Error> {
        match entry.kind.as_str() {
            "human" => Ok(Message::user(entry.content)),
            "ai" => Ok(Message::assistant(entry.content)),
            other => Err(AgentError::ParsingError(format!(
                "unsupported history entry type '{}', expected 'human' or 'ai'",
                other
            ))),
        }
    }
}

/// Converts client history into a conversation.
pub fn conversation_from_history(history: Vec<HistoryEntry>) -> Result<Conversation, AgentError> {
    history
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Conversation::from)
}

/// A component built at startup, or the reason it could not be.
#[derive(Debug, Clone)]
pub enum Readiness<T> {
    Ready(T),
    NotReady(String),
}

impl<T> Readiness<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    /// Borrow the component, failing with `BackendUnavailable` when it is not ready.
    pub fn get(&self) -> Result<&T, AgentError> {
        match self {
            Readiness::Ready(value) => Ok(value),
            Readiness::NotReady(reason) => Err(AgentError::BackendUnavailable(reason.clone())),
        }
    }

    pub fn from_result(result: Result<T, AgentError>) -> Self {
        match result {
            Ok(value) => Readiness::Ready(value),
            Err(err) => Readiness::NotReady(err.to_string()),
        }
    }
}
