use std::sync::{Arc, OnceLock};

use crate::pool::DatabasePool;
use crate::store::DataStore;

/// Set-once holder for the process's active pool/store pair.
///
/// The composition root constructs the backend once, sets it here, and
/// injects the registry wherever data access is needed; there is no
/// module-level global. A second `set_*` is an error rather than a silent
/// replacement, preserving "constructed once, shared thereafter".
///
/// # Example
///
/// ```ignore
/// let registry = DataRegistry::new();
/// let pool = SqliteDatabasePool::open(&config).await?;
/// registry.set_store(Arc::new(SqliteStore::new(pool.clone())))?;
/// registry.set_pool(Arc::new(pool))?;
///
/// let store = registry.require_store()?;
/// ```
pub struct DataRegistry {
    pool: OnceLock<Arc<dyn DatabasePool>>,
    store: OnceLock<Arc<dyn DataStore>>,
}

/// Errors from the registry contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The slot was already populated.
    AlreadySet(&'static str),
    /// The slot was read before the composition root populated it.
    NotSet(&'static str),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::AlreadySet(slot) => {
                write!(f, "Data {slot} is already set and cannot be replaced")
            }
            RegistryError::NotSet(slot) => write!(f, "No data {slot} has been set"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl DataRegistry {
    pub const fn new() -> Self {
        Self {
            pool: OnceLock::new(),
            store: OnceLock::new(),
        }
    }

    pub fn set_pool(&self, pool: Arc<dyn DatabasePool>) -> Result<(), RegistryError> {
        self.pool
            .set(pool)
            .map_err(|_| RegistryError::AlreadySet("pool"))
    }

    pub fn set_store(&self, store: Arc<dyn DataStore>) -> Result<(), RegistryError> {
        self.store
            .set(store)
            .map_err(|_| RegistryError::AlreadySet("store"))
    }

    pub fn pool(&self) -> Option<Arc<dyn DatabasePool>> {
        self.pool.get().cloned()
    }

    pub fn store(&self) -> Option<Arc<dyn DataStore>> {
        self.store.get().cloned()
    }

    pub fn require_pool(&self) -> Result<Arc<dyn DatabasePool>, RegistryError> {
        self.pool().ok_or(RegistryError::NotSet("pool"))
    }

    pub fn require_store(&self) -> Result<Arc<dyn DataStore>, RegistryError> {
        self.store().ok_or(RegistryError::NotSet("store"))
    }
}

impl Default for DataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{QueryOptions, WhereCondition};
    use crate::error::DataError;
    use crate::pool::Row;
    use crate::store::MutationResult;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EmptyStore;

    #[async_trait]
    impl DataStore for EmptyStore {
        async fn find_one(
            &self,
            _table: &str,
            _conditions: &[WhereCondition],
        ) -> Result<Option<Row>, DataError> {
            Ok(None)
        }

        async fn find_many(
            &self,
            _table: &str,
            _options: &QueryOptions,
        ) -> Result<Vec<Row>, DataError> {
            Ok(Vec::new())
        }

        async fn count(
            &self,
            _table: &str,
            _conditions: &[WhereCondition],
        ) -> Result<u64, DataError> {
            Ok(0)
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

    #[test]
    fn require_before_set_is_an_error() {
        let registry = DataRegistry::new();
        assert_eq!(registry.require_store().err(), Some(RegistryError::NotSet("store")));
        assert!(registry.store().is_none());
    }

    #[test]
    fn set_once_then_shared() {
        let registry = DataRegistry::new();
        registry.set_store(Arc::new(EmptyStore)).unwrap();
        assert!(registry.require_store().is_ok());

        let err = registry.set_store(Arc::new(EmptyStore)).unwrap_err();
        assert_eq!(err, RegistryError::AlreadySet("store"));
    }
}
