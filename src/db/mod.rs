//! Database layer
//!
//! The Content Store: persistence and query composition for articles,
//! images, topics and likes. SQLite is the default backend for single-binary
//! deployment; MySQL is available for larger installs.
//!
//! # Usage
//!
//! ```ignore
//! use newsroom::config::DatabaseConfig;
//! use newsroom::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
