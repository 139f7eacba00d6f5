//! FlowX Store - SQLite persistence for the unit-of-work core
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - Row mapping for timer jobs, executable jobs and deployments
//! - `SqliteStore`, a `DataStore` whose updates and deletes are
//!   compare-and-set on the row revision

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod sqlite_store;

// Re-export key types
pub use errors::Result;
pub use sqlite_store::SqliteStore;
