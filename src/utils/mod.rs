//! Utility functions and helpers for the sitegate proxy.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and session token redaction.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
