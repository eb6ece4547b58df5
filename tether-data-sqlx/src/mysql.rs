//! MySQL backend: a sized connection pool behind the pool contract.
//!
//! MySQL has no `RETURNING`, so `create`/`update_by_id` execute the
//! statement and follow up with a `SELECT` keyed on the auto-increment id
//! the driver reports.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo, ValueRef as _};
use tether_data::sql::{self, Dialect, ID_COLUMN};
use tether_data::{
    DataError, DataStore, DatabasePool, ExecResult, MutationResult, PoolTransaction, QueryOptions,
    Row, WhereCondition,
};

use crate::config::DatabaseConfig;
use crate::error::SqlxErrorExt;

/// Connection manager for a MySQL database.
#[derive(Clone)]
pub struct MySqlDatabasePool {
    pool: sqlx::MySqlPool,
}

impl MySqlDatabasePool {
    /// Connect to the database at `config.url` with a pool bounded by
    /// `config.max_connections`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| e.into_data_error())?;
        tracing::info!(max_connections = config.max_connections, "connected mysql pool");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool, for callers that need driver-level access.
    pub fn pool(&self) -> &sqlx::MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for MySqlDatabasePool {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        let sql = Dialect::MySql.convert_placeholders(sql);
        tracing::debug!(sql = %sql, params = params.len(), "mysql query");
        let rows = bind_all(&sql, params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        let sql = Dialect::MySql.convert_placeholders(sql);
        tracing::debug!(sql = %sql, params = params.len(), "mysql execute");
        let result = bind_all(&sql, params)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error())?;
        let insert_id = result.last_insert_id();
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: (insert_id != 0).then_some(insert_id as i64),
        })
    }

    async fn begin(&self) -> Result<Box<dyn PoolTransaction>, DataError> {
        let tx = self.pool.begin().await.map_err(|e| e.into_data_error())?;
        Ok(Box::new(MySqlTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("closed mysql pool");
    }
}

struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl PoolTransaction for MySqlTransaction {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError> {
        let sql = Dialect::MySql.convert_placeholders(sql);
        let rows = bind_all(&sql, params)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        rows.iter().map(row_to_json).collect()
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError> {
        let sql = Dialect::MySql.convert_placeholders(sql);
        let result = bind_all(&sql, params)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| e.into_data_error())?;
        let insert_id = result.last_insert_id();
        Ok(ExecResult {
            affected: result.rows_affected(),
            insert_id: (insert_id != 0).then_some(insert_id as i64),
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), DataError> {
        self.tx.commit().await.map_err(|e| e.into_data_error())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DataError> {
        self.tx.rollback().await.map_err(|e| e.into_data_error())
    }
}

/// [`DataStore`] implementation over a [`MySqlDatabasePool`].
///
/// Written rows are recovered with a follow-up `SELECT` by id, since the
/// dialect lacks `RETURNING`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlDatabasePool,
}

impl MySqlStore {
    pub fn new(pool: MySqlDatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for MySqlStore {
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
        let (sql, params) = sql::build_select(table, &options, Dialect::MySql)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Row>, DataError> {
        let (sql, params) = sql::build_select(table, options, Dialect::MySql)?;
        self.pool.query(&sql, &params).await
    }

    async fn count(&self, table: &str, conditions: &[WhereCondition]) -> Result<u64, DataError> {
        let (sql, params) = sql::build_count(table, conditions, Dialect::MySql)?;
        let rows = self.pool.query(&sql, &params).await?;
        Ok(count_from_rows(&rows))
    }

    async fn create(&self, table: &str, data: &Row) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_insert(table, data, Dialect::MySql)?;
        let result = self.pool.execute(&sql, &params).await?;
        let data = match result.insert_id {
            Some(id) => {
                self.find_one(table, &[WhereCondition::eq(ID_COLUMN, id)])
                    .await?
            }
            None => None,
        };
        Ok(MutationResult {
            data,
            affected: result.affected,
        })
    }

    async fn update_by_id(
        &self,
        table: &str,
        id: &Value,
        data: &Row,
    ) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_update_by_id(table, id, data, Dialect::MySql)?;
        let result = self.pool.execute(&sql, &params).await?;
        let data = if result.affected > 0 {
            self.find_one(table, &[WhereCondition::eq(ID_COLUMN, id.clone())])
                .await?
        } else {
            None
        };
        Ok(MutationResult {
            data,
            affected: result.affected,
        })
    }

    async fn delete_by_id(&self, table: &str, id: &Value) -> Result<MutationResult, DataError> {
        let (sql, params) = sql::build_delete_by_id(table, id, Dialect::MySql)?;
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

fn bind_all<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, MySql, MySqlArguments> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value);
    }
    query
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        // Arrays and objects bind natively as JSON.
        value => query.bind(value.clone()),
    }
}

fn row_to_json(row: &MySqlRow) -> Result<Row, DataError> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_column(row, idx)?);
    }
    Ok(out)
}

fn decode_column(row: &MySqlRow, idx: usize) -> Result<Value, DataError> {
    let raw = row.try_get_raw(idx).map_err(|e| e.into_data_error())?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_info = raw.type_info();
    let type_name = type_info.name();

    match type_name {
        "BOOLEAN" => row
            .try_get::<bool, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<u64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(|v| Value::from(v as f64))
            .map_err(|e| e.into_data_error()),
        "DOUBLE" => row
            .try_get::<f64, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .map_err(|e| e.into_data_error()),
        "JSON" => row
            .try_get::<Value, _>(idx)
            .map_err(|e| e.into_data_error()),
        "TIMESTAMP" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|v| Value::from(v.to_rfc3339()))
            .map_err(|e| e.into_data_error()),
        "DATETIME" => row
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
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::from(BASE64.encode(bytes)))
            .map_err(|e| e.into_data_error()),
        other => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Ok(Value::from(text)),
            Err(_) => {
                tracing::warn!(column_type = other, "unsupported mysql column type");
                Ok(Value::Null)
            }
        },
    }
}
