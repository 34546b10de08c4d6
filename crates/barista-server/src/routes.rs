//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use barista_core::core_types::{conversation_from_history, HistoryEntry};
use barista_core::evaluator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, Result};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpressionParams {
    pub expression: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub query: String,
    pub answer: String,
    pub context: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutletResponse {
    pub query: String,
    pub answer: String,
    pub raw_detail: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub expression: String,
    pub result: Value,
    pub status: String,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::bad_request(format!(
            "the '{}' parameter is required",
            name
        ))),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let unavailable = state.services.unavailable();
    let message = if unavailable.is_empty() {
        "Barista assistant is running".to_string()
    } else {
        let names: Vec<&str> = unavailable.iter().map(|(name, _)| *name).collect();
        format!(
            "Barista assistant is running; not ready: {}",
            names.join(", ")
        )
    };
    Json(json!({ "status": "ok", "message": message }))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("the message must not be empty"));
    }

    let agent = state
        .services
        .agent
        .get()
        .map_err(|err| ApiError::NotReady(err.to_string()))?;
    let history = conversation_from_history(request.history)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    log::debug!(
        "Chat turn with {} prior messages: {}",
        history.len(),
        request.message
    );
    let outcome = agent.run_turn(history, &request.message).await?;
    Ok(Json(ChatResponse {
        answer: outcome.answer,
    }))
}

pub async fn products(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<ProductResponse>> {
    let query = required(params.query, "query")?;
    let products = state
        .services
        .products
        .get()
        .map_err(|err| ApiError::NotReady(err.to_string()))?;

    let answer = products.answer(&query).await?;
    Ok(Json(ProductResponse {
        query,
        answer: answer.answer,
        context: answer.context,
    }))
}

pub async fn outlets(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<OutletResponse>> {
    let query = required(params.query, "query")?;
    let outlets = state
        .services
        .outlets
        .get()
        .map_err(|err| ApiError::NotReady(err.to_string()))?;

    let answer = outlets.answer(&query).await?;
    Ok(Json(OutletResponse {
        query,
        answer: answer.answer,
        raw_detail: answer.raw_detail,
    }))
}

pub async fn calculate(Query(params): Query<ExpressionParams>) -> Result<Json<CalculateResponse>> {
    let expression = required(params.expression, "expression")?;
    let value = evaluator::evaluate(&expression).map_err(barista_core::AgentError::from)?;

    Ok(Json(CalculateResponse {
        expression,
        result: number_value(value),
        status: "success".to_string(),
    }))
}

/// Integral results are sent as JSON integers.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
