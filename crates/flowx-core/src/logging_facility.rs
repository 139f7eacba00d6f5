//! Structured logging facility for FlowX
//!
//! - Single initialization point via `init(profile)`
//! - Structured macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use flowx_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! The command pipeline logs every command through these macros; the timer
//! acquisition loop logs lost optimistic-lock races at DEBUG and any other
//! cycle failure at ERROR.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
