use crate::sql::QueryError;

/// Errors that can occur in the data layer.
///
/// "Record absent" is deliberately not represented here: `find_one` returns
/// `None`, `find_many` returns `[]`, and mutations report `affected == 0`.
#[derive(Debug)]
pub enum DataError {
    /// Network, socket, TLS, authentication, or driver failure while
    /// establishing or using a connection.
    Connection(String),
    /// Could not acquire a connection before the pool's deadline.
    PoolTimeout(String),
    /// The backend rejected a statement: SQL syntax, constraint violation,
    /// type mismatch. `code` carries the backend's SQLSTATE or extended
    /// result code when available.
    Statement {
        code: Option<String>,
        message: String,
    },
    /// The query could not be built from the condition model.
    Query(QueryError),
    /// A row could not be converted to the requested shape.
    Decode(String),
    /// Malformed connection configuration.
    Config(String),
}

impl DataError {
    /// Construct a `Statement` variant without a backend code.
    pub fn statement(message: impl Into<String>) -> Self {
        DataError::Statement {
            code: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Connection(msg) => write!(f, "Connection error: {msg}"),
            DataError::PoolTimeout(msg) => write!(f, "Pool timeout: {msg}"),
            DataError::Statement {
                code: Some(code),
                message,
            } => write!(f, "Statement error [{code}]: {message}"),
            DataError::Statement {
                code: None,
                message,
            } => write!(f, "Statement error: {message}"),
            DataError::Query(err) => write!(f, "Query error: {err}"),
            DataError::Decode(msg) => write!(f, "Decode error: {msg}"),
            DataError::Config(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for DataError {
    fn from(err: QueryError) -> Self {
        DataError::Query(err)
    }
}
