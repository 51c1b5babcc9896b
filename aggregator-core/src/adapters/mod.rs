//! Adapters - concrete implementations of external dependencies

pub mod duckdb;
pub mod lock;

pub use self::duckdb::Database;
pub use self::lock::MigrationLock;
