//! The tool-routing agent loop.
//!
//! One call to [`Agent::run_turn`] is one conversation turn: the model is asked
//! to either answer or request tools, requested tools are dispatched through
//! the registry and their results appended to the conversation, and the model
//! is asked again until it answers. The agent keeps no state between turns;
//! the caller owns the conversation.

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AgentSettings;
use crate::core_types::{Conversation, LLMResponse, Message, ToolCall};
use crate::errors::AgentError;
use crate::llm::{ToolMetadata, LLM};
use crate::tools::ToolRegistry;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful ZUS Coffee assistant. Follow these rules precisely:\n\
1. You have three tools: 'calculator' for arithmetic, 'product-lookup' for questions about ZUS Coffee drinkware products, and 'outlet-lookup' for questions about ZUS Coffee outlets, their addresses, states and operating hours.\n\
2. When the user asks a question, decide whether a tool is needed. Always use the calculator for arithmetic instead of calculating yourself.\n\
3. If a tool is needed, call it and you will receive its output.\n\
4. After you receive a tool output, your only job is to write a natural language answer for the user. Do not call another tool.\n\
5. If a tool output starts with 'Error:', politely tell the user what went wrong using that message.\n\
6. Use the earlier messages of the conversation to understand follow-up questions.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Rounds of tool calls allowed in one turn before the model must answer.
    pub max_tool_rounds: usize,
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_tool_rounds: settings.max_tool_rounds,
            system_prompt: settings
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnState {
    AwaitingModelDecision,
    ToolRequested,
    ToolExecuting,
    FinalAnswerProduced,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Prior history, the user message, every tool exchange and the answer.
    pub conversation: Conversation,
    pub transitions: Vec<TurnState>,
    pub tool_rounds: usize,
}

pub struct Agent {
    llm: Arc<dyn LLM>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(llm: Arc<dyn LLM>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self { llm, tools, config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs one turn on top of `history` and returns the extended conversation.
    ///
    /// Tool failures never end the turn; they reach the model as `Error:` tool
    /// results. A failed model call fails the whole turn.
    pub async fn run_turn(
        &self,
        history: Conversation,
        user_message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        log::info!("Agent turn started: {}", user_message);
        let mut conversation = history;
        conversation.push(Message::user(user_message));

        let mut transitions = vec![TurnState::AwaitingModelDecision];
        let mut tool_rounds = 0;

        loop {
            let offer_tools = tool_rounds < self.config.max_tool_rounds;
            let response = self.decide(&conversation, offer_tools).await?;

            if response.requested_calls().is_empty() {
                let answer = final_answer(&response).ok_or_else(|| {
                    AgentError::UpstreamModel(
                        "model returned neither an answer nor a tool call".to_string(),
                    )
                })?;
                return Ok(self.finish(conversation, answer, transitions, tool_rounds));
            }

            if !offer_tools {
                // tools were withheld, so calls here are ignored
                return match final_answer(&response) {
                    Some(answer) => {
                        log::warn!("Model requested tools after the round cap, using its text");
                        Ok(self.finish(conversation, answer, transitions, tool_rounds))
                    }
                    None => {
                        log::error!(
                            "Model kept requesting tools after {} rounds",
                            self.config.max_tool_rounds
                        );
                        Err(AgentError::MaxStepsReached)
                    }
                };
            }

            transitions.push(TurnState::ToolRequested);
            let calls: Vec<ToolCall> = response
                .requested_calls()
                .iter()
                .cloned()
                .map(with_call_id)
                .collect();
            conversation.push(Message::assistant_with_calls(
                response.content.clone().unwrap_or_default(),
                calls.clone(),
            ));

            transitions.push(TurnState::ToolExecuting);
            let results = self.execute_calls(&calls).await;
            for (call, result) in calls.iter().zip(results) {
                let call_id = call.id.clone().unwrap_or_default();
                conversation.push(Message::tool_result(call_id, result));
            }

            tool_rounds += 1;
            transitions.push(TurnState::AwaitingModelDecision);
        }
    }

    async fn decide(
        &self,
        conversation: &Conversation,
        offer_tools: bool,
    ) -> Result<LLMResponse, AgentError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::system(self.config.system_prompt.clone()));
        }
        messages.extend(conversation.messages().iter().cloned());

        let tools: Option<Vec<ToolMetadata>> = if offer_tools {
            Some(self.tools.list_tools()).filter(|tools| !tools.is_empty())
        } else {
            None
        };
        log::debug!(
            "Asking the model ({} messages, {} tools)",
            messages.len(),
            tools.as_ref().map_or(0, Vec::len)
        );

        self.llm.generate(messages, tools).await.inspect_err(|err| {
            log::error!("Language model call failed: {}", err);
        })
    }

    /// Dispatches every call concurrently; results come back in call order.
    async fn execute_calls(&self, calls: &[ToolCall]) -> Vec<String> {
        for call in calls {
            log::info!("Tool call {:?}: {}", call.id, call.name);
        }
        join_all(calls.iter().map(|call| self.tools.dispatch_call(call))).await
    }

    fn finish(
        &self,
        mut conversation: Conversation,
        answer: String,
        mut transitions: Vec<TurnState>,
        tool_rounds: usize,
    ) -> TurnOutcome {
        conversation.push(Message::assistant(answer.clone()));
        transitions.push(TurnState::FinalAnswerProduced);
        log::info!("Agent turn finished after {} tool rounds", tool_rounds);
        TurnOutcome {
            answer,
            conversation,
            transitions,
            tool_rounds,
        }
    }
}

fn final_answer(response: &LLMResponse) -> Option<String> {
    response
        .content
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Gives a call without an identifier a fresh one so its result can be paired.
fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.as_deref().map_or(true, |id| id.trim().is_empty()) {
        call.id = Some(format!("call_{}", uuid::Uuid::new_v4().simple()));
    }
    call
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Role;
    use crate::tools::CalculatorTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was offered.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<LLMResponse>>,
        calls: Mutex<Vec<(Vec<Message>, bool)>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<LLMResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLM for ScriptedLlm {
        async fn generate(
            &self,
            messages: Vec<Message>,
            tools: Option<Vec<ToolMetadata>>,
        ) -> Result<LLMResponse, AgentError> {
            self.calls.lock().unwrap().push((messages, tools.is_some()));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left"))
        }
    }

    fn calculator_call(id: Option<&str>, expression: &str) -> ToolCall {
        ToolCall {
            id: id.map(str::to_string),
            name: "calculator".to_string(),
            arguments: json!({ "expression": expression }),
        }
    }

    fn agent(llm: Arc<ScriptedLlm>, max_tool_rounds: usize) -> Agent {
        let mut registry = ToolRegistry::new();
        registry.register_tool(Arc::new(CalculatorTool::new()));
        Agent::new(
            llm,
            Arc::new(registry),
            AgentConfig {
                max_tool_rounds,
                ..AgentConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let llm = ScriptedLlm::new(vec![LLMResponse::text("Hello! How can I help?")]);
        let outcome = agent(llm.clone(), 3)
            .run_turn(Conversation::new(), "hi")
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Hello! How can I help?");
        assert_eq!(
            outcome.transitions,
            vec![TurnState::AwaitingModelDecision, TurnState::FinalAnswerProduced]
        );
        assert_eq!(outcome.tool_rounds, 0);

        let calls = llm.calls.lock().unwrap();
        let (messages, offered) = &calls[0];
        assert!(*offered);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], Message::user("hi"));
    }

    #[tokio::test]
    async fn test_history_is_kept_and_system_prompt_left_out() {
        let llm = ScriptedLlm::new(vec![LLMResponse::text("It is RM 79.00.")]);
        let history = Conversation::from(vec![
            Message::user("Tell me about the All Day Cup"),
            Message::assistant("It is a 500ml tumbler."),
        ]);

        let outcome = agent(llm.clone(), 3)
            .run_turn(history, "How much is it?")
            .await
            .unwrap();

        let messages = outcome.conversation.messages();
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().all(|m| m.role != Role::System));
        assert_eq!(messages[2], Message::user("How much is it?"));
        assert_eq!(messages[3], Message::assistant("It is RM 79.00."));
        assert_eq!(llm.calls.lock().unwrap()[0].0.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_call_ids_are_generated() {
        let llm = ScriptedLlm::new(vec![
            LLMResponse::calls(vec![calculator_call(None, "6*7")]),
            LLMResponse::text("6 times 7 is 42."),
        ]);
        let outcome = agent(llm, 3)
            .run_turn(Conversation::new(), "what is 6*7?")
            .await
            .unwrap();

        let messages = outcome.conversation.messages();
        let requested = messages[1].tool_calls.as_ref().unwrap();
        let id = requested[0].id.clone().unwrap();
        assert!(id.starts_with("call_"));
        assert_eq!(messages[2], Message::tool_result(id, "Result: 42"));
    }

    #[tokio::test]
    async fn test_round_cap_withholds_tools() {
        let llm = ScriptedLlm::new(vec![
            LLMResponse::calls(vec![calculator_call(Some("a"), "1+1")]),
            LLMResponse::calls(vec![calculator_call(Some("b"), "2+2")]),
            LLMResponse::text("1+1 is 2 and 2+2 is 4."),
        ]);
        let outcome = agent(llm.clone(), 2)
            .run_turn(Conversation::new(), "add things")
            .await
            .unwrap();

        assert_eq!(outcome.tool_rounds, 2);
        let offered: Vec<bool> = llm.calls.lock().unwrap().iter().map(|(_, o)| *o).collect();
        assert_eq!(offered, vec![true, true, false]);
    }

    #[tokio::test]
    async fn test_calls_after_cap_without_text_fail() {
        let llm = ScriptedLlm::new(vec![
            LLMResponse::calls(vec![calculator_call(Some("a"), "1+1")]),
            LLMResponse::calls(vec![calculator_call(Some("b"), "2+2")]),
        ]);
        let result = agent(llm, 1).run_turn(Conversation::new(), "loop").await;
        assert_eq!(result.unwrap_err(), AgentError::MaxStepsReached);
    }

    #[tokio::test]
    async fn test_calls_after_cap_with_text_use_the_text() {
        let llm = ScriptedLlm::new(vec![
            LLMResponse::calls(vec![calculator_call(Some("a"), "1+1")]),
            LLMResponse {
                content: Some("The answer is 2.".to_string()),
                tool_calls: Some(vec![calculator_call(Some("b"), "1+1")]),
                ..Default::default()
            },
        ]);
        let outcome = agent(llm, 1)
            .run_turn(Conversation::new(), "1+1?")
            .await
            .unwrap();
        assert_eq!(outcome.answer, "The answer is 2.");
    }

    #[tokio::test]
    async fn test_empty_model_output_is_an_upstream_failure() {
        let llm = ScriptedLlm::new(vec![LLMResponse::text("   ")]);
        let result = agent(llm, 3).run_turn(Conversation::new(), "hi").await;
        assert!(matches!(result, Err(AgentError::UpstreamModel(_))));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AgentSettings {
            name: "barista".to_string(),
            max_tool_rounds: 5,
            system_prompt: None,
        };
        let config = AgentConfig::from(&settings);
        assert_eq!(config.max_tool_rounds, 5);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }
}
