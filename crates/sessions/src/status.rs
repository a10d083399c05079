//! Read-only projections of the registry.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::SessionRegistry;

/// One open session as seen by clients.  Never carries the device handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    #[serde(rename = "path")]
    pub device_id: String,
    #[serde(rename = "filename")]
    pub log_name: String,
    pub baud_rate: u32,
    pub session_id: String,
    pub opened_at: DateTime<Utc>,
    pub lines_logged: u64,
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub sessions: Vec<SessionStatus>,
    pub default_log_name: String,
}

impl StatusSnapshot {
    pub fn active_ports(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.device_id.clone()).collect()
    }

    pub fn is_connected(&self) -> bool {
        !self.sessions.is_empty()
    }

    /// The log a single-device client is writing to: the only session's
    /// log, or the default name when zero or several sessions are open.
    pub fn current_log_name(&self) -> &str {
        match self.sessions.as_slice() {
            [only] => &only.log_name,
            _ => &self.default_log_name,
        }
    }
}

impl SessionRegistry {
    /// Snapshot of live sessions.  Only reads registry metadata.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            sessions: self.live_sessions(),
            default_log_name: self.default_log_name().to_string(),
        }
    }
}
