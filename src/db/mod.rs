//! Database module: local SQLite storage for explorer preferences.
//!
//! - `repo`: pool setup, migrations, and SQL-only preference functions.
//!
//! External modules should import from `table_explorer::db`; the repository
//! API is re-exported here.

pub mod repo;

pub use repo::*;
