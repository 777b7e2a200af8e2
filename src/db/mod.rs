//! Database layer
//!
//! SQLite is the default (single-file deployment); MySQL can be selected in
//! `config.yml`. Everything above this module talks to `DynDatabasePool` and
//! the repository traits, never to a concrete driver.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, is_unique_violation, mysql_pool, sqlite_pool, DatabasePool,
    DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
