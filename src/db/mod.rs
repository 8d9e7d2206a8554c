//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The driver
//! is selected from configuration and hidden behind the `DatabasePool`
//! trait so repositories can dispatch on `driver()`.
//!
//! # Usage
//!
//! ```ignore
//! use omnitags::config::DatabaseConfig;
//! use omnitags::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
