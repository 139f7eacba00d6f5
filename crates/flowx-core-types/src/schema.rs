//! Canonical schema constants for structured logging
//!
//! These constants keep field keys consistent between the logging macros,
//! the command pipeline and the acquisition loop.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Unit of work
pub const FIELD_CONTEXT_ID: &str = "context_id";
pub const FIELD_COMMAND: &str = "command";
pub const FIELD_REUSED: &str = "reused";

// Flush plan sizes
pub const FIELD_INSERTS: &str = "inserts";
pub const FIELD_UPDATES: &str = "updates";
pub const FIELD_DELETES: &str = "deletes";

// Job acquisition
pub const FIELD_JOB_ID: &str = "job_id";
pub const FIELD_LOCK_OWNER: &str = "lock_owner";
pub const FIELD_ACQUIRED: &str = "acquired";
pub const FIELD_WAIT_MS: &str = "wait_ms";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
