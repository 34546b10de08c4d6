//! Core of a coffee retailer's conversational assistant.
//!
//! A language model routes each customer question to one of three tools and
//! composes the final answer from the tool's output.
//!
//! # Architecture Overview
//!
//! - **Agent loop**: turn-taking state machine between the model and the tools
//! - **Tools**: calculator, product lookup and outlet lookup behind one registry
//!   that turns every failure into text the model can relay
//! - **Expression evaluator**: validate-then-evaluate arithmetic sandbox
//! - **Retrieval**: chunked, embedded product listings with JSON snapshots
//! - **Outlets**: SQLite outlet table queried through model-written SELECTs
//! - **Scraping**: product and outlet pages parsed into documents and records
//! - **Services**: startup wiring with explicit not-ready states
//! - **Configuration**: YAML with environment-resolved secrets

pub mod agent;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod evaluator;
pub mod llm;
pub mod outlets;
pub mod persist;
pub mod rag;
pub mod scrape;
pub mod services;
pub mod tools;

pub use agent::{Agent, AgentConfig, TurnOutcome, TurnState};
pub use config::*;
pub use core_types::{Conversation, HistoryEntry, Message, Readiness, ToolCall};
pub use errors::AgentError;
pub use llm::LLM;
pub use outlets::{OutletAnswer, OutletQa};
pub use rag::{ProductAnswer, ProductQa};
pub use services::Services;
