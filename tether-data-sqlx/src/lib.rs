//! # tether-data-sqlx — SQLx backends for the Tether data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-backed
//! implementations of the contracts in [`tether-data`]: one
//! `DatabasePool` + `DataStore` pair per dialect, plus environment-driven
//! configuration and `sqlx::Error` bridging.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DatabaseConfig`] | Connection parameters, sourced from the environment |
//! | `SqliteDatabasePool` / `SqliteStore` | Single-file SQLite backend (WAL, foreign keys on) |
//! | `PgDatabasePool` / `PgStore` | PostgreSQL backend over a sized connection pool |
//! | `MySqlDatabasePool` / `MySqlStore` | MySQL backend over a sized connection pool |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Feature flags
//!
//! Enable the database drivers you need:
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//! | `mysql`    | MySQL via `sqlx/mysql` |
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! tether-data-sqlx = { version = "0.1", features = ["sqlite"] }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use tether_data::prelude::*;
//! use tether_data_sqlx::{DatabaseConfig, SqliteDatabasePool, SqliteStore};
//!
//! let config = DatabaseConfig::from_env()?;
//! let pool = SqliteDatabasePool::open(&config).await?;
//! let store = SqliteStore::new(pool.clone());
//!
//! let registry = DataRegistry::new();
//! registry.set_store(Arc::new(store))?;
//! registry.set_pool(Arc::new(pool))?;
//!
//! let user = registry
//!     .require_store()?
//!     .find_one("users", &[WhereCondition::eq("email", "a@b.com")])
//!     .await?;
//! ```
//!
//! # Dialect differences handled here
//!
//! Statements reach each pool in `$1, $2, …` form; SQLite/MySQL rewrite
//! them to `?`. PostgreSQL and SQLite fetch written rows in the same round
//! trip via `RETURNING *`; MySQL executes and follows up with a `SELECT`
//! by `last_insert_id`. JSON-ish values bind natively where the driver
//! supports it and as serialized `TEXT` on SQLite.

pub mod config;
pub mod error;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::DatabaseConfig;
pub use error::{SqlxErrorExt, SqlxResult};
#[cfg(feature = "mysql")]
pub use mysql::{MySqlDatabasePool, MySqlStore};
#[cfg(feature = "postgres")]
pub use postgres::{PgDatabasePool, PgStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDatabasePool, SqliteStore};

/// Re-exports of the most commonly used types from both `tether-data` and
/// this crate.
pub mod prelude {
    pub use crate::{DatabaseConfig, SqlxErrorExt, SqlxResult};
    #[cfg(feature = "mysql")]
    pub use crate::{MySqlDatabasePool, MySqlStore};
    #[cfg(feature = "postgres")]
    pub use crate::{PgDatabasePool, PgStore};
    #[cfg(feature = "sqlite")]
    pub use crate::{SqliteDatabasePool, SqliteStore};
    pub use tether_data::prelude::*;
}
