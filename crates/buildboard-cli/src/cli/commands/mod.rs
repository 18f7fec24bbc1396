//! CLI command handlers.

pub mod config;
pub mod snapshot;
pub mod watch;
