//! Repository layer mapping flowx-core entities onto SQLite rows

pub mod hydration;
pub mod sqlite_repo;

pub use sqlite_repo::SqliteRepo;
