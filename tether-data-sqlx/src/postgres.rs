//! PostgreSQL backend: a sized connection pool behind the pool contract.
//!
//! Placeholders are already native (`$1, $2, …`), so statements pass
//! through unrewritten; written rows come back via `RETURNING *`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef as _};
use tether_data::sql::{self, Dialect};
use tether_data::{
    DataError, DataStore, DatabasePool, ExecResult, MutationResult, PoolTransaction, QueryOptions,
    Row, WhereCondition,
};

use crate::config::DatabaseConfig;
use crate::error::SqlxErrorExt;

/// Connection manager for a PostgreSQL database.
#[derive(Clone)]
pub struct PgDatabasePool {
    pool: sqlx::PgPool,
}

impl PgDatabasePool {
    /// Connect to the database at `config.url` with a pool bounded by
    /// `config.max_connections`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| e.into_data_error())?;
        tracing::info!(max_connections = config.max_connections, "connected postgres pool");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool, for callers that need driver-level access.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PgDatabasePool {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        tracing::debug!(sql = %sql, params = params.len(), "postgres query");
        let rows = bind_all(sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        tracing::debug!(sql = %sql, params = params.len(), "postgres execute");
        let result = bind_all(sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        // No last-insert-id on postgres; generated keys travel via RETURNING.
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: None,
        })
    }

    async fn begin(&self) -> Result<Box<dyn PoolTransaction>, DataError> {
        let tx = self.pool.begin().await.map_err(|e| e.into_data_error())?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("closed postgres pool");
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl PoolTransaction for PgTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        let rows = bind_all(sql, params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        let result = bind_all(sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: None,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.tx.commit().await.map_err(|e| e.into_data_error())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.tx.rollback().await.map_err(|e| e.into_data_error())
    }
}

/// [`DataStore`] implementation over a [`PgDatabasePool`].
///
/// `create`/`update_by_id` fetch the written row in the same round trip
/// via `RETURNING *`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgDatabasePool,
}

impl PgStore {
    pub fn new(pool: PgDatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn find_one(
        &self,
        table: &str,
        conditions: &[WhereCondition],
    ) -> Result<Option<Row>, DataError> {
        let options = QueryOptions {
            conditions: conditions.to_vec(),
            limit: Some(1),
            ..QueryOptions::default()
        };
        let (sql, params) = sql::build_select(table, &options, Dialect::Postgres)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Row>, DataError> {
        let (sql, params) = sql::build_select(table, options, Dialect::Postgres)?;
        self.pool.query(&sql, &params).await
    }

    async fn count(&self, table: &str, conditions: &[WhereCondition]) -> Result<u64, DataError> {
        let (sql, params) = sql::build_count(table, conditions, Dialect::Postgres)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(count_from_rows(&rows))
    }

    async fn create(&self, table: &str, data: &Row) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_insert(table, data, Dialect::Postgres)?;
        let rows = self.pool.query(&sql, &params).await?;
        let affected = rows.len() as u64;
        Ok(MutationResult {
            data: rows.into_iter().next(),
            affected,
        })
    }

    async fn update_by_id(
        &self,
        table: &str,
        id: &Value,
        data: &Row,
    ) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_update_by_id(table, id, data, Dialect::Postgres)?;
        let rows = self.pool.query(&sql, &params).await?;
        let affected = rows.len() as u64;
        Ok(MutationResult {
            data: rows.into_iter().next(),
            affected,
        })
    }

    async fn delete_by_id(&self, table: &str, id: &Value) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_delete_by_id(table, id, Dialect::Postgres)?;
        let result = self.pool.execute(&sql, &params).await?;
        Ok(MutationResult {
            data: None,
            affected: result.affected,
        })
    }
}

fn count_from_rows(rows: &[Row]) -> u64 {
    rows.first()
        .and_then(|row| row.values().next())
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn bind_all<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value);
    }
    query
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        // Arrays and objects bind natively as JSONB.
        value => query.bind(value.clone()),
    }
}

fn row_to_json(row: &PgRow) -> Result<Row, DataError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_column(row, idx)?);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, idx: usize) -> Result<Value, DataError> {
    let raw = row.try_get_raw(idx).map_err(|e| e.into_data_error())?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_info = raw.type_info();
    let type_name = type_info.name();

    match type_name {
        "BOOL" => row
            .try_get::<bool, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "INT2" => row
            .try_get::<i16, _>(idx)
            .map(|v| Value::from(v as i64))
            .map_err(|e| e.into_data_error()),
        "INT4" => row
            .try_get::<i32, _>(idx)
            .map(|v| Value::from(v as i64))
            .map_err(|e| e.into_data_error()),
        "INT8" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "FLOAT4" => row
            .try_get::<f32, _>(idx)
            .map(|v| Value::from(v as f64))
            .map_err(|e| e.into_data_error()),
        "FLOAT8" => row
            .try_get::<f64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "JSON" | "JSONB" => row
            .try_get::<Value, _>(idx)
            .map_err(|e| e.into_data_error()),
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(idx)
            .map(|v| Value::from(v.to_string()))
            .map_err(|e| e.into_data_error()),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|v| Value::from(v.to_rfc3339()))
            .map_err(|e| e.into_data_error()),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|v| Value::from(v.to_string()))
            .map_err(|e| e.into_data_error()),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|v| Value::from(v.to_string()))
            .map_err(|e| e.into_data_error()),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|v| Value::from(v.to_string()))
            .map_err(|e| e.into_data_error()),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::from(BASE64.encode(bytes)))
            .map_err(|e| e.into_data_error()),
        other => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Ok(Value::from(text)),
            Err(_) => {
                tracing::warn!(column_type = other, "unsupported postgres column type");
                Ok(Value::Null)
            }
        },
    }
}
