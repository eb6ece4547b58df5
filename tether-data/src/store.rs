use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::condition::{QueryOptions, WhereCondition};
use crate::error::DataError;
use crate::pool::Row;

/// Result of a mutating operation.
#[derive(Debug, Clone, Default)]
pub struct MutationResult {
    /// The written row, where the backend can return it (`RETURNING`, or a
    /// follow-up lookup by generated id).
    pub data: Option<Row>,
    /// Rows actually touched by the last statement. `0` on
    /// `update_by_id`/`delete_by_id` means "no such id", not an error.
    pub affected: u64,
}

impl MutationResult {
    /// Deserialize the returned row, if any, into a typed value.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, DataError> {
        self.data.clone().map(decode_row).transpose()
    }
}

/// The uniform CRUD façade used by resource/handler code.
///
/// One implementation per backend, each wrapping exactly one
/// [`DatabasePool`](crate::pool::DatabasePool) and sharing its lifetime.
/// "Record absent" is a normal outcome, never an error: `find_one` returns
/// `None`, `find_many` returns `[]`, and the `*_by_id` mutations report
/// `affected == 0`. The layer performs no automatic retry or deduplication.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Return the first row matching `conditions`, or `None`.
    ///
    /// Applies `limit = 1` internally.
    async fn find_one(
        &self,
        table: &str,
        conditions: &[WhereCondition],
    ) -> Result<Option<Row>, DataError>;

    /// Return all rows matching `options`.
    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Row>, DataError>;

    /// Count the rows matching `conditions`.
    async fn count(&self, table: &str, conditions: &[WhereCondition]) -> Result<u64, DataError>;

    /// Insert a row and return it where the backend can.
    async fn create(&self, table: &str, data: &Row) -> Result<MutationResult, DataError>;

    /// Update the row with the given id. `affected == 0` signals "no such
    /// id" without an error; callers map it to their own not-found handling.
    async fn update_by_id(
        &self,
        table: &str,
        id: &Value,
        data: &Row,
    ) -> Result<MutationResult, DataError>;

    /// Delete the row with the given id. `affected` reports whether a row
    /// actually existed; `data` is always `None`.
    async fn delete_by_id(&self, table: &str, id: &Value) -> Result<MutationResult, DataError>;
}

/// Typed access over a [`DataStore`].
///
/// Blanket-implemented, so it works on concrete stores and on
/// `Arc<dyn DataStore>` alike. Decode failures surface as
/// [`DataError::Decode`], distinct from statement errors.
pub trait DataStoreExt: DataStore {
    fn find_one_as<T>(
        &self,
        table: &str,
        conditions: &[WhereCondition],
    ) -> impl Future<Output = Result<Option<T>, DataError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            match self.find_one(table, conditions).await? {
                Some(row) => Ok(Some(decode_row(row)?)),
                None => Ok(None),
            }
        }
    }

    fn find_many_as<T>(
        &self,
        table: &str,
        options: &QueryOptions,
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            self.find_many(table, options)
                .await?
                .into_iter()
                .map(decode_row)
                .collect()
        }
    }
}

impl<S: DataStore + ?Sized> DataStoreExt for S {}

pub(crate) fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T, DataError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| DataError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
        age: Option<i64>,
    }

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn mutation_result_decodes_data() {
        let result = MutationResult {
            data: Some(row(json!({ "id": 1, "name": "alice", "age": null }))),
            affected: 1,
        };
        let user: Option<User> = result.data_as().unwrap();
        assert_eq!(
            user,
            Some(User {
                id: 1,
                name: "alice".to_string(),
                age: None
            })
        );
    }

    #[test]
    fn mutation_result_without_data_decodes_to_none() {
        let result = MutationResult::default();
        let user: Option<User> = result.data_as().unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn decode_failure_is_a_decode_error() {
        let result = MutationResult {
            data: Some(row(json!({ "id": "not-a-number", "name": "x" }))),
            affected: 1,
        };
        let err = result.data_as::<User>().unwrap_err();
        assert!(matches!(err, DataError::Decode(_)));
    }

    /// Serves canned rows so the extension trait can be exercised without
    /// a backend.
    struct CannedStore {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl DataStore for CannedStore {
        async fn find_one(
            &self,
            _table: &str,
            _conditions: &[WhereCondition],
        ) -> Result<Option<Row>, DataError> {
            Ok(self.rows.first().cloned())
        }

        async fn find_many(
            &self,
            _table: &str,
            _options: &QueryOptions,
        ) -> Result<Vec<Row>, DataError> {
            Ok(self.rows.clone())
        }

        async fn count(
            &self,
            _table: &str,
            _conditions: &[WhereCondition],
        ) -> Result<u64, DataError> {
            Ok(self.rows.len() as u64)
        }

        async fn create(&self, _table: &str, _data: &Row) -> Result<MutationResult, DataError> {
            Ok(MutationResult::default())
        }

        async fn update_by_id(
            &self,
            _table: &str,
            _id: &Value,
            _data: &Row,
        ) -> Result<MutationResult, DataError> {
            Ok(MutationResult::default())
        }

        async fn delete_by_id(
            &self,
            _table: &str,
            _id: &Value,
        ) -> Result<MutationResult, DataError> {
            Ok(MutationResult::default())
        }
    }

    #[tokio::test]
    async fn typed_access_works_through_a_trait_object() {
        let store = CannedStore {
            rows: vec![
                row(json!({ "id": 1, "name": "alice", "age": 30 })),
                row(json!({ "id": 2, "name": "bob", "age": null })),
            ],
        };
        let store: &dyn DataStore = &store;

        let users: Vec<User> = store.find_many_as("users", &QueryOptions::new()).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].age, None);

        let one: Option<User> = store.find_one_as("users", &[]).await.unwrap();
        assert_eq!(one.unwrap().name, "alice");
    }
}
