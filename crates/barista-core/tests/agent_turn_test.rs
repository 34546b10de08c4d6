use async_trait::async_trait;
use barista_core::agent::{Agent, AgentConfig, TurnState};
use barista_core::core_types::{Conversation, LLMResponse, Message, Readiness, Role, ToolCall};
use barista_core::errors::AgentError;
use barista_core::llm::{ToolMetadata, LLM};
use barista_core::tools::{CalculatorTool, ProductLookupTool, Tool, ToolRegistry};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Step {
    Respond(LLMResponse),
    Fail(AgentError),
}

struct ScriptedLLM {
    script: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLLM {
    fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn generate(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<ToolMetadata>>,
    ) -> Result<LLMResponse, AgentError> {
        self.seen.lock().unwrap().push(messages);
        match self.script.lock().unwrap().pop_front() {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(err)) => Err(err),
            None => panic!("the model was called more often than scripted"),
        }
    }
}

/// Echoes its input after a delay and counts invocations.
struct EchoTool {
    name: &'static str,
    delay: Duration,
    invocations: AtomicUsize,
}

impl EchoTool {
    fn new(name: &'static str, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            delay: Duration::from_millis(delay_ms),
            invocations: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.name.to_string(),
            description: "echoes its input".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn execute(&self, input: &str) -> Result<String, AgentError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(format!("{} saw {}", self.name, input))
    }
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: Some(id.to_string()),
        name: name.to_string(),
        arguments,
    }
}

fn agent(llm: Arc<ScriptedLLM>, tools: Vec<Arc<dyn Tool>>) -> Agent {
    let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(5));
    for tool in tools {
        registry.register_tool(tool);
    }
    Agent::new(llm, Arc::new(registry), AgentConfig::default())
}

fn tool_results(conversation: &Conversation) -> Vec<(String, String)> {
    conversation
        .messages()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.clone().unwrap_or_default(), m.content.clone()))
        .collect()
}

#[tokio::test]
async fn test_one_tool_call_then_final_answer() {
    let echo = EchoTool::new("product-lookup", 0);
    let llm = ScriptedLLM::new(vec![
        Step::Respond(LLMResponse::calls(vec![call(
            "call_1",
            "product-lookup",
            json!({"query": "tumblers"}),
        )])),
        Step::Respond(LLMResponse::text("We have two tumblers.")),
    ]);

    let outcome = agent(llm.clone(), vec![echo.clone()])
        .run_turn(Conversation::new(), "Do you sell tumblers?")
        .await
        .unwrap();

    assert_eq!(echo.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(
        tool_results(&outcome.conversation),
        vec![("call_1".to_string(), "product-lookup saw tumblers".to_string())]
    );
    assert_eq!(outcome.answer, "We have two tumblers.");
    assert_eq!(
        outcome.transitions,
        vec![
            TurnState::AwaitingModelDecision,
            TurnState::ToolRequested,
            TurnState::ToolExecuting,
            TurnState::AwaitingModelDecision,
            TurnState::FinalAnswerProduced,
        ]
    );
    assert_eq!(llm.calls(), 2);

    // the second decision sees the tool result paired with its call
    let seen = llm.seen.lock().unwrap();
    let last = seen[1].last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn test_results_follow_request_order_not_completion_order() {
    let slow = EchoTool::new("outlet-lookup", 150);
    let fast = EchoTool::new("product-lookup", 0);
    let llm = ScriptedLLM::new(vec![
        Step::Respond(LLMResponse::calls(vec![
            call("call_slow", "outlet-lookup", json!({"query": "outlets in Selangor"})),
            call("call_fast", "product-lookup", json!({"query": "mugs"})),
            call("call_calc", "calculator", json!({"expression": "2^3"})),
        ])),
        Step::Respond(LLMResponse::text("Here is everything you asked for.")),
    ]);
    let tools: Vec<Arc<dyn Tool>> = vec![slow, fast, Arc::new(CalculatorTool::new())];

    let outcome = agent(llm, tools)
        .run_turn(Conversation::new(), "several things")
        .await
        .unwrap();

    assert_eq!(
        tool_results(&outcome.conversation),
        vec![
            ("call_slow".to_string(), "outlet-lookup saw outlets in Selangor".to_string()),
            ("call_fast".to_string(), "product-lookup saw mugs".to_string()),
            ("call_calc".to_string(), "Result: 8".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_tool_failures_become_results_and_the_turn_continues() {
    let llm = ScriptedLLM::new(vec![
        Step::Respond(LLMResponse::calls(vec![
            call("call_unknown", "espresso-machine", json!({"input": "double shot"})),
            call("call_bad_args", "calculator", json!(42)),
            call("call_div", "calculator", json!({"expression": "10/0"})),
            call("call_injection", "calculator", json!({"expression": "__import__('os')"})),
            call("call_not_ready", "product-lookup", json!({"query": "cups"})),
        ])),
        Step::Respond(LLMResponse::text(
            "Sorry, I couldn't complete some of those requests.",
        )),
    ]);
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(CalculatorTool::new()),
        Arc::new(ProductLookupTool::new(Readiness::NotReady(
            "product index was not built".to_string(),
        ))),
    ];

    let outcome = agent(llm, tools)
        .run_turn(Conversation::new(), "try everything")
        .await
        .unwrap();

    let results = tool_results(&outcome.conversation);
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|(_, text)| text.starts_with("Error:")));
    assert_eq!(results[0].1, "Error: Unknown tool: 'espresso-machine'");
    assert!(results[1].1.starts_with("Error: Malformed tool call"));
    assert!(results[2].1.starts_with("Error: Arithmetic error"));
    assert!(results[3].1.starts_with("Error: Invalid expression"));
    assert_eq!(
        results[4].1,
        "Error: Backend unavailable: product index was not built"
    );
    assert_eq!(
        outcome.answer,
        "Sorry, I couldn't complete some of those requests."
    );
}

#[tokio::test]
async fn test_model_failure_fails_the_turn() {
    let llm = ScriptedLLM::new(vec![Step::Fail(AgentError::UpstreamModel(
        "connection refused".to_string(),
    ))]);
    let result = agent(llm.clone(), vec![])
        .run_turn(Conversation::new(), "hello")
        .await;

    assert_eq!(
        result.unwrap_err(),
        AgentError::UpstreamModel("connection refused".to_string())
    );
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_model_failure_after_a_tool_round_is_not_retried() {
    let echo = EchoTool::new("outlet-lookup", 0);
    let llm = ScriptedLLM::new(vec![
        Step::Respond(LLMResponse::calls(vec![call(
            "call_1",
            "outlet-lookup",
            json!("opening hours in Bangsar"),
        )])),
        Step::Fail(AgentError::Timeout {
            operation: "language model call".to_string(),
            seconds: 60,
        }),
    ]);

    let result = agent(llm.clone(), vec![echo.clone()])
        .run_turn(Conversation::new(), "When does Bangsar open?")
        .await;

    assert!(matches!(result, Err(AgentError::Timeout { .. })));
    assert_eq!(echo.invocations.load(Ordering::SeqCst), 1);
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn test_uncooperative_model_is_capped() {
    let echo = EchoTool::new("product-lookup", 0);
    let mut script = Vec::new();
    for round in 0..4 {
        script.push(Step::Respond(LLMResponse::calls(vec![call(
            &format!("call_{}", round),
            "product-lookup",
            json!({"query": "again"}),
        )])));
    }
    let llm = ScriptedLLM::new(script);

    let result = agent(llm.clone(), vec![echo.clone()])
        .run_turn(Conversation::new(), "loop forever")
        .await;

    assert_eq!(result.unwrap_err(), AgentError::MaxStepsReached);
    assert_eq!(echo.invocations.load(Ordering::SeqCst), 3);
    assert_eq!(llm.calls(), 4);
}

#[tokio::test]
async fn test_follow_up_turn_builds_on_returned_conversation() {
    let llm = ScriptedLLM::new(vec![
        Step::Respond(LLMResponse::calls(vec![call(
            "call_1",
            "calculator",
            json!({"expression": "3 * 79"}),
        )])),
        Step::Respond(LLMResponse::text("Three cups cost RM 237.")),
        Step::Respond(LLMResponse::text("Yes, that includes all three cups.")),
    ]);
    let agent = agent(llm.clone(), vec![Arc::new(CalculatorTool::new())]);

    let first = agent
        .run_turn(Conversation::new(), "How much are 3 cups at RM 79?")
        .await
        .unwrap();
    let second = agent
        .run_turn(first.conversation.clone(), "Is that for all of them?")
        .await
        .unwrap();

    assert_eq!(second.answer, "Yes, that includes all three cups.");
    assert!(second.conversation.len() > first.conversation.len());
    assert_eq!(
        &second.conversation.messages()[..first.conversation.len()],
        first.conversation.messages()
    );
    let seen = llm.seen.lock().unwrap();
    assert!(seen[2]
        .iter()
        .any(|m| m.content == "Three cups cost RM 237."));
}
