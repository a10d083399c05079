use serde::Serialize;

/// Structured trace events emitted across all SerialLog crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionOpened {
        device: String,
        session_id: String,
        baud_rate: u32,
        log_name: String,
    },
    SessionClosed {
        device: String,
        session_id: String,
        lines_logged: u64,
    },
    /// The device ended the session on its own (error or EOF).
    SessionTerminated {
        device: String,
        session_id: String,
        reason: String,
    },
    LogNameChanged {
        device: String,
        old_name: String,
        new_name: String,
    },
    LogAppend {
        log_name: String,
        bytes: usize,
    },
    MockInjected {
        log_name: String,
        chars: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sl_event");
    }
}
