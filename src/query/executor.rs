//! Query execution against Postgres.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgColumn, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::DatabaseConfig;

/// A result row as a JSON object, keys in column order.
pub type Row = Map<String, Value>;

/// Errors raised while executing a query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The database or pool failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Trait for executing a static read query and returning its rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` and return every row it produced, in order.
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, QueryError>;
}

/// Postgres implementation of [`QueryExecutor`] over a shared pool.
///
/// Connections are borrowed from the pool for the duration of one query only.
#[derive(Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    /// Create an executor whose pool connects on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);

        debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Postgres pool configured"
        );

        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>, QueryError> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        trace!(rows = rows.len(), "Query returned");
        rows.iter().map(row_to_json).collect()
    }
}

fn row_to_json(row: &PgRow) -> Result<Row, QueryError> {
    let mut record = Row::new();
    for column in row.columns() {
        record.insert(column.name().to_string(), column_to_json(row, column)?);
    }
    Ok(record)
}

/// Convert one column to JSON by its Postgres type.
///
/// `NUMERIC` is rendered as a string to keep its precision. Types without a
/// mapping become `null`.
fn column_to_json(row: &PgRow, column: &PgColumn) -> Result<Value, QueryError> {
    let idx = column.ordinal();
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match column.type_info().name() {
        "BOOL" => json!(row.try_get::<bool, _>(idx)?),
        "INT2" => json!(row.try_get::<i16, _>(idx)?),
        "INT4" => json!(row.try_get::<i32, _>(idx)?),
        "INT8" => json!(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => json!(row.try_get::<f32, _>(idx)?),
        "FLOAT8" => json!(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => json!(row.try_get::<Decimal, _>(idx)?.to_string()),
        "DATE" => json!(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "TIME" => json!(row.try_get::<NaiveTime, _>(idx)?.to_string()),
        "TIMESTAMP" => json!(row
            .try_get::<NaiveDateTime, _>(idx)?
            .format("%Y-%m-%dT%H:%M:%S%.f")
            .to_string()),
        "TIMESTAMPTZ" => json!(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => json!(row.try_get::<String, _>(idx)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        other => {
            debug!(column = column.name(), pg_type = other, "No JSON mapping for column type");
            Value::Null
        }
    };

    Ok(value)
}
