//! Append-only log files for SerialLog.
//!
//! Every log is a flat text file under one directory, named by a
//! normalized [`LogName`].  Entries are single lines of the form
//! `[<RFC 3339 UTC timestamp>] <text>` and are never rewritten.

pub mod name;
pub mod store;

pub use name::{default_log_name, LogName};
pub use store::{format_entry, LogStore};
