use futures_util::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Connection, Row, TypeInfo, ValueRef};
use std::path::{Path, PathBuf};

use crate::errors::AgentError;
use crate::outlets::OutletRecord;
use crate::persist;
use crate::scrape::OutletSource;

const CREATE_TABLE: &str = r#"
CREATE TABLE outlets (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    state TEXT NOT NULL,
    status TEXT NOT NULL,
    operating_hours TEXT
)
"#;

/// Table description given to the model when it writes queries.
pub const SCHEMA_DESCRIPTION: &str = "Table outlets(id INTEGER PRIMARY KEY, name TEXT, address TEXT, state TEXT, status TEXT, operating_hours TEXT). \
It contains ZUS Coffee outlet information: name, address (which includes the city), \
state ('Kuala Lumpur', 'Selangor' or 'N/A' when unknown), status ('Open' or 'Closed') \
and the default operating_hours.";

const MAX_READ_CONNECTIONS: u32 = 4;

/// Read-only handle on the outlet database.
///
/// The database file is written once per scrape and replaced as a whole; every
/// connection of this handle runs with `query_only` enabled.
#[derive(Clone)]
pub struct OutletStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl OutletStore {
    pub async fn open(path: &Path) -> Result<Self, AgentError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .pragma("query_only", "ON");
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_READ_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                AgentError::Storage(format!(
                    "Failed to open outlet database {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Opens the database at `path`, scraping and building it first when it is
    /// absent or unreadable.
    pub async fn ensure_ready(path: &Path, source: &dyn OutletSource) -> Result<Self, AgentError> {
        if persist::exists(path).await {
            let opened = match Self::open(path).await {
                Ok(store) => store.count().await.map(|count| (store, count)),
                Err(err) => Err(err),
            };
            match opened {
                Ok((store, count)) => {
                    log::info!("Opened outlet database {} ({} outlets)", path.display(), count);
                    return Ok(store);
                }
                Err(err) => log::warn!("Rebuilding outlet database: {}", err),
            }
        } else {
            log::info!("No outlet database at {}, building one", path.display());
        }

        let records = source.fetch_outlets().await?;
        Self::rebuild(path, &records).await
    }

    /// Writes `records` into a fresh database and swaps it in for `path`.
    ///
    /// Fails without touching `path` when there are no records.
    pub async fn rebuild(path: &Path, records: &[OutletRecord]) -> Result<Self, AgentError> {
        if records.is_empty() {
            return Err(AgentError::ScrapeFailure(
                "no outlets were found, refusing to build an empty store".to_string(),
            ));
        }

        persist::ensure_parent_dir(path).await?;
        let staging = persist::staging_path(path);
        if let Err(err) = write_database(&staging, records).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(err);
        }
        persist::commit(&staging, path).await?;
        log::info!(
            "Rebuilt outlet database {} with {} outlets",
            path.display(),
            records.len()
        );

        Self::open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn count(&self) -> Result<i64, AgentError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outlets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn records(&self) -> Result<Vec<OutletRecord>, AgentError> {
        let rows = sqlx::query(
            "SELECT name, address, state, status, operating_hours FROM outlets ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<OutletRecord, AgentError> {
                let status: String = row.try_get("status")?;
                let hours: Option<String> = row.try_get("operating_hours")?;
                Ok(OutletRecord {
                    name: row.try_get("name")?,
                    address: row.try_get("address")?,
                    state: row.try_get("state")?,
                    status: status.parse()?,
                    operating_hours: hours.unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Runs a read-only statement and returns at most `max_rows` rows as JSON
    /// objects keyed by column name.
    pub async fn fetch_rows(
        &self,
        sql: &str,
        max_rows: usize,
    ) -> Result<Vec<Map<String, Value>>, AgentError> {
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut rows = Vec::new();
        while rows.len() < max_rows {
            let Some(row) = stream.try_next().await? else {
                break;
            };
            rows.push(row_to_json(&row));
        }
        Ok(rows)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn write_database(path: &Path, records: &[OutletRecord]) -> Result<(), AgentError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await?;

    let mut tx = conn.begin().await?;
    sqlx::query(CREATE_TABLE).execute(&mut *tx).await?;
    for record in records {
        sqlx::query(
            "INSERT INTO outlets (name, address, state, status, operating_hours) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.name)
        .bind(&record.address)
        .bind(&record.state)
        .bind(record.status.as_str())
        .bind(&record.operating_hours)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    conn.close().await?;
    Ok(())
}

fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|column| {
            let index = column.ordinal();
            (column.name().to_string(), column_value(row, index))
        })
        .collect()
}

fn column_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_ascii_uppercase(),
        Err(_) => return Value::Null,
    };

    let as_integer = || row.try_get::<i64, _>(index).ok().map(Value::from);
    let as_real = || row.try_get::<f64, _>(index).ok().map(Value::from);
    let as_text = || row.try_get::<String, _>(index).ok().map(Value::from);

    let value = match type_name.as_str() {
        "INTEGER" | "INT" | "INT8" | "BIGINT" | "BOOLEAN" => as_integer(),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => as_real(),
        _ => as_text().or_else(as_integer).or_else(as_real),
    };
    value.unwrap_or(Value::Null)
}
