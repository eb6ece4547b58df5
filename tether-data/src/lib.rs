//! # tether-data — Tether's data access layer
//!
//! The dialect-neutral half of the data layer: the condition/query model,
//! the SQL compiler and placeholder translator, the [`DatabasePool`] and
//! [`DataStore`] contracts, and the set-once [`DataRegistry`] through which
//! the composition root shares the active backend. The SQLx-backed
//! SQLite/PostgreSQL/MySQL implementations live in `tether-data-sqlx`.

pub mod condition;
pub mod error;
pub mod page;
pub mod pool;
pub mod registry;
pub mod sql;
pub mod store;

pub use condition::{Operator, OrderBy, QueryOptions, SortDirection, WhereCondition};
pub use error::DataError;
pub use page::{Page, Pageable};
pub use pool::{DatabasePool, ExecResult, PoolTransaction, Row};
pub use registry::{DataRegistry, RegistryError};
pub use sql::{Dialect, QueryError, ID_COLUMN};
pub use store::{DataStore, DataStoreExt, MutationResult};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        DataError, DataRegistry, DataStore, DataStoreExt, DatabasePool, Dialect, ExecResult,
        MutationResult, OrderBy, Page, Pageable, PoolTransaction, QueryOptions, Row,
        SortDirection, WhereCondition,
    };
}
