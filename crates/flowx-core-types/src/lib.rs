//! Core types shared across FlowX crates
//!
//! - **Identifiers**: ContextId, LockOwner
//! - **Schema constants**: canonical structured-logging field keys and event names

pub mod ids;
pub mod schema;

pub use ids::{ContextId, LockOwner};
