use tether_data::DataError;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
/// implemented in this crate. Use `.into_data_error()` at the driver
/// boundary instead.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match self {
            sqlx::Error::PoolTimedOut => {
                DataError::PoolTimeout("timed out waiting for a pooled connection".to_string())
            }
            sqlx::Error::Database(err) => DataError::Statement {
                code: err.code().map(|code| code.to_string()),
                message: err.to_string(),
            },
            err @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                DataError::Decode(err.to_string())
            }
            sqlx::Error::Encode(err) => DataError::statement(err.to_string()),
            sqlx::Error::Configuration(err) => DataError::Config(err.to_string()),
            err => DataError::Connection(err.to_string()),
        }
    }
}

/// Convenience alias for data-layer results using `DataError`.
pub type SqlxResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_distinct_from_statement_failure() {
        let err = sqlx::Error::PoolTimedOut.into_data_error();
        assert!(matches!(err, DataError::PoolTimeout(_)));
    }

    #[test]
    fn configuration_errors_map_to_config() {
        let err = sqlx::Error::Configuration("bad url".into()).into_data_error();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn io_errors_map_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = sqlx::Error::Io(io).into_data_error();
        assert!(matches!(err, DataError::Connection(_)));
    }
}
