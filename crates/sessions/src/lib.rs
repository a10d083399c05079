//! Device session management for SerialLog.
//!
//! The [`SessionRegistry`] owns every open device, binds each one to a log
//! name and runs one ingress task per session that streams device lines
//! into the [`LogStore`](sl_logstore::LogStore).  Read-only projections
//! live in [`status`]; mock injection writes straight to the store.

mod ingress;
pub mod inject;
pub mod registry;
pub mod status;

pub use ingress::IngressExit;
pub use registry::{CloseOutcome, RegistrySettings, SessionRegistry};
pub use status::{SessionStatus, StatusSnapshot};
