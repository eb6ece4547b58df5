//! SQLite backend: a single-file database behind the pool contract.
//!
//! WAL journal mode and foreign-key enforcement are enabled at open. The
//! driver serializes writers; concurrent readers are fine under WAL, but
//! callers must not assume write concurrency.

use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef as _};
use tether_data::sql::{self, Dialect};
use tether_data::{
    DataError, DataStore, DatabasePool, ExecResult, MutationResult, PoolTransaction, QueryOptions,
    Row, WhereCondition,
};

use crate::config::DatabaseConfig;
use crate::error::SqlxErrorExt;

/// Connection manager for a single-file SQLite database.
#[derive(Clone)]
pub struct SqliteDatabasePool {
    pool: sqlx::SqlitePool,
}

impl SqliteDatabasePool {
    /// Open the database at `config.url`, creating the file if missing.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DataError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| e.into_data_error())?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| e.into_data_error())?;
        tracing::info!(url = %config.url, "opened sqlite database");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool, for callers that need driver-level access.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabasePool {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        let sql = Dialect::Sqlite.convert_placeholders(sql);
        tracing::debug!(sql = %sql, params = params.len(), "sqlite query");
        let rows = bind_all(&sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        let sql = Dialect::Sqlite.convert_placeholders(sql);
        tracing::debug!(sql = %sql, params = params.len(), "sqlite execute");
        let result = bind_all(&sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        let rowid = result.last_insert_rowid();
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: (rowid != 0).then_some(rowid),
        })
    }

    async fn begin(&self) -> Result<Box<dyn PoolTransaction>, DataError> {
        let tx = self.pool.begin().await.map_err(|e| e.into_data_error())?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("closed sqlite database");
    }
}

struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl PoolTransaction for SqliteTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        let sql = Dialect::Sqlite.convert_placeholders(sql);
        let rows = bind_all(&sql, params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        let sql = Dialect::Sqlite.convert_placeholders(sql);
        let result = bind_all(&sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        let rowid = result.last_insert_rowid();
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: (rowid != 0).then_some(rowid),
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.tx.commit().await.map_err(|e| e.into_data_error())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.tx.rollback().await.map_err(|e| e.into_data_error())
    }
}

/// [`DataStore`] implementation over a [`SqliteDatabasePool`].
///
/// `create`/`update_by_id` fetch the written row in the same round trip
/// via `RETURNING *`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqliteDatabasePool,
}

impl SqliteStore {
    pub fn new(pool: SqliteDatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for SqliteStore {
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
        let (sql, params) = sql::build_select(table, &options, Dialect::Sqlite)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Row>, DataError> {
        let (sql, params) = sql::build_select(table, options, Dialect::Sqlite)?;
        self.pool.query(&sql, &params).await
    }

    async fn count(&self, table: &str, conditions: &[WhereCondition]) -> Result<u64, DataError> {
        let (sql, params) = sql::build_count(table, conditions, Dialect::Sqlite)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(count_from_rows(&rows))
    }

    async fn create(&self, table: &str, data: &Row) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_insert(table, data, Dialect::Sqlite)?;
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
        let (sql, params) = sql::build_update_by_id(table, id, data, Dialect::Sqlite)?;
        let rows = self.pool.query(&sql, &params).await?;
        let affected = rows.len() as u64;
        Ok(MutationResult {
            data: rows.into_iter().next(),
            affected,
        })
    }

    async fn delete_by_id(&self, table: &str, id: &Value) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_delete_by_id(table, id, Dialect::Sqlite)?;
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

fn bind_all<'q>(
    sql: &'q str,
    params: &'q [Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value);
    }
    query
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        // Arrays and objects are stored as serialized JSON text.
        value => query.bind(value.to_string()),
    }
}

fn row_to_json(row: &SqliteRow) -> Result<Row, DataError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_column(row, idx)?);
    }
    Ok(out)
}

fn decode_column(row: &SqliteRow, idx: usize) -> Result<Value, DataError> {
    let raw = row.try_get_raw(idx).map_err(|e| e.into_data_error())?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_info = raw.type_info();
    let type_name = type_info.name();

    // SQLite typing is dynamic: trust the value's storage class.
    match type_name {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "REAL" | "NUMERIC" => row
            .try_get::<f64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "BOOLEAN" => row
            .try_get::<bool, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "TEXT" | "DATETIME" | "DATE" | "TIME" => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::from(BASE64.encode(bytes)))
            .map_err(|e| e.into_data_error()),
        other => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Ok(Value::from(text)),
            Err(_) => {
                tracing::warn!(column_type = other, "unsupported sqlite column type");
                Ok(Value::Null)
            }
        },
    }
}
