use async_trait::async_trait;
use serde_json::Value;

use crate::error::DataError;
use crate::sql::Dialect;

/// A database row, keyed by column name.
///
/// Rows cross the pool/store contract as JSON objects because table names
/// and column sets are dynamic strings; typed access is layered on top via
/// [`DataStoreExt`](crate::store::DataStoreExt).
pub type Row = serde_json::Map<String, Value>;

/// Result of a statement that does not produce rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecResult {
    /// Rows actually touched by the statement.
    pub affected: u64,
    /// The backend-assigned auto-increment id, where the driver reports one.
    pub insert_id: Option<i64>,
}

/// Backend-specific connection/resource manager.
///
/// Owns the physical connection(s) and executes parameterized statements:
/// a single-file handle for SQLite, sized connection pools for
/// PostgreSQL/MySQL. Created once per process (or per dialect
/// configuration) and shared for the process lifetime.
///
/// Statements accept `$1, $2, …` placeholders regardless of backend; each
/// pool rewrites them to its driver's native syntax before execution.
/// Statement and connection errors propagate unmodified; the pool never
/// retries. Pool-exhaustion timeouts surface as
/// [`DataError::PoolTimeout`], distinct from statement failure.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// The SQL dialect this pool speaks.
    fn dialect(&self) -> Dialect;

    /// Execute a row-returning statement.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError>;

    /// Execute a statement, reporting the affected-row count and any
    /// auto-increment id.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError>;

    /// Begin a transaction scope on a dedicated connection.
    async fn begin(&self) -> Result<Box<dyn PoolTransaction>, DataError>;

    /// Close the pool, waiting for checked-out connections to be returned.
    async fn close(&self);
}

/// A unit of work bounded by explicit commit/rollback.
///
/// Holds one connection for the scope's duration. Dropping an uncommitted
/// transaction rolls it back and returns the connection to the pool, so
/// every exit path (early `?` returns and panics included) releases the
/// scope with changes reverted.
#[async_trait]
pub trait PoolTransaction: Send {
    /// Execute a row-returning statement inside the transaction.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DataError>;

    /// Execute a statement inside the transaction.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult, DataError>;

    /// Commit the transaction, finalizing its changes.
    async fn commit(self: Box<Self>) -> Result<(), DataError>;

    /// Roll the transaction back explicitly.
    async fn rollback(self: Box<Self>) -> Result<(), DataError>;
}
