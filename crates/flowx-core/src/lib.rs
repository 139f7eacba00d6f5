//! FlowX Core - transactional execution kernel
//!
//! This crate provides the unit-of-work machinery every engine operation runs
//! through:
//! - Entity contract with identity, revision and lifecycle flags
//! - Per-context entity cache with dirty detection and ordered flush
//! - Command pipeline (interceptor chain, context stacking and reuse)
//! - Store, clock and event-dispatch seams
//! - In-memory store used by tests and embedded setups
//! - Error and logging facilities shared by the other crates

pub mod cache;
pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod entity;
pub mod errors;
pub mod events;
pub mod executor;
pub mod interceptor;
pub mod logging_facility;
pub mod model;
pub mod store;

pub use flowx_core_types as core_types;

// Re-export commonly used types
pub use command::{command_fn, Command};
pub use config::{CommandConfig, RetryConfig};
pub use context::{CommandContext, CommandContextCloseListener};
pub use entity::{Entity, EntityHeader, EntityKind, HeaderMut, HeaderToken, Persistable};
pub use errors::{ExError, ExErrorKind, FlowXError, Result};
pub use executor::{CommandExecutor, CommandExecutorBuilder};
pub use store::{DataStore, StoreTransaction};
