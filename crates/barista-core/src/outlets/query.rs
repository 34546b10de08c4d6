//! Natural-language questions over the outlet table.
//!
//! The model writes one SQLite query for the question, the query is checked to
//! be a single read-only SELECT, executed with a row cap, and the rows are
//! handed back to the model to compose the answer.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};

use crate::errors::AgentError;
use crate::llm::{self, LLM};
use crate::outlets::store::{OutletStore, SCHEMA_DESCRIPTION};

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("Invalid regex")
});

static FORBIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|ATTACH|DETACH|PRAGMA|VACUUM|REINDEX|TRUNCATE|REPLACE\s+INTO)\b",
    )
    .expect("Invalid regex")
});

// String literals and quoted identifiers, with doubled quotes as escapes.
static QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*""#).expect("Invalid regex")
});

static LEADING_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(SELECT|WITH)\b").expect("Invalid regex"));

/// Answer to an outlet question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletAnswer {
    pub query: String,
    pub answer: String,
    /// The executed SQL and the rows it returned.
    pub raw_detail: Value,
}

#[async_trait]
pub trait OutletQa: Send + Sync {
    async fn answer(&self, question: &str) -> Result<OutletAnswer, AgentError>;
}

pub struct SqlQueryEngine {
    store: OutletStore,
    llm: Arc<dyn LLM>,
    max_rows: usize,
}

impl SqlQueryEngine {
    pub fn new(store: OutletStore, llm: Arc<dyn LLM>, max_rows: usize) -> Self {
        Self {
            store,
            llm,
            max_rows,
        }
    }

    async fn write_query(&self, question: &str) -> Result<String, AgentError> {
        let prompt = format!(
            "You are a SQLite expert. Write one SQLite SELECT statement that answers the question below.\n\
             Use only this table:\n{}\n\n\
             Return at most {} rows. Use LIKE with '%' wildcards when matching names, cities or addresses.\n\
             Reply with the SQL statement only, no explanation and no markdown.\n\n\
             Question: {}\n\
             SQL:",
            SCHEMA_DESCRIPTION, self.max_rows, question
        );
        let reply = llm::complete(self.llm.as_ref(), prompt).await?;
        Ok(extract_sql(&reply))
    }

    async fn compose(&self, question: &str, sql: &str, rows: &Value) -> Result<String, AgentError> {
        let prompt = format!(
            "Answer the customer's question about ZUS Coffee outlets using only the query result below. \
             If the result is empty, say that no matching outlets were found.\n\n\
             Question: {}\n\
             SQL query: {}\n\
             SQL result: {}\n\
             Answer:",
            question, sql, rows
        );
        llm::complete(self.llm.as_ref(), prompt).await
    }
}

#[async_trait]
impl OutletQa for SqlQueryEngine {
    async fn answer(&self, question: &str) -> Result<OutletAnswer, AgentError> {
        let generated = self.write_query(question).await?;
        let sql = validate_select(&generated)?;
        log::debug!("Outlet query for '{}': {}", question, sql);

        let rows = self.store.fetch_rows(&sql, self.max_rows).await?;
        let rows = Value::Array(rows.into_iter().map(Value::Object).collect());
        let answer = self.compose(question, &sql, &rows).await?;

        Ok(OutletAnswer {
            query: question.to_string(),
            answer,
            raw_detail: json!({ "sql": sql, "rows": rows }),
        })
    }
}

/// SQL text from a model reply, without markdown fences or a leading label.
pub fn extract_sql(reply: &str) -> String {
    let body = FENCE_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map_or(reply, |m| m.as_str());
    let body = body.trim();
    let body = ["SQLQuery:", "SQL:"]
        .iter()
        .find_map(|label| body.strip_prefix(label))
        .unwrap_or(body);
    body.trim().to_string()
}

/// Accepts a single read-only SELECT (or WITH ... SELECT) statement and returns
/// it without its trailing semicolon.
pub fn validate_select(sql: &str) -> Result<String, AgentError> {
    let statement = sql.trim();
    let statement = statement.strip_suffix(';').unwrap_or(statement).trim();

    if statement.is_empty() {
        return Err(AgentError::QueryRejected("the query is empty".to_string()));
    }
    // keywords and semicolons inside quotes are data
    let code = QUOTED_RE.replace_all(statement, "''");
    if code.contains(';') {
        return Err(AgentError::QueryRejected(
            "only a single statement is allowed".to_string(),
        ));
    }
    if !LEADING_KEYWORD_RE.is_match(statement) {
        return Err(AgentError::QueryRejected(format!(
            "only SELECT queries are allowed, got: {}",
            statement
        )));
    }
    if let Some(keyword) = FORBIDDEN_RE.find(&code) {
        return Err(AgentError::QueryRejected(format!(
            "'{}' is not allowed in an outlet query",
            keyword.as_str()
        )));
    }

    Ok(statement.to_string())
}
