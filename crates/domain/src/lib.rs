//! Shared types for SerialLog: error taxonomy, configuration model and
//! structured trace events.

pub mod config;
pub mod error;
pub mod trace;
