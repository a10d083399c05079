use std::time::Duration;

use serde::Serialize;
use sl_domain::config::SerialConfig;
use sl_domain::error::Result;
use tokio::sync::mpsc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A device the provider can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(rename = "portType")]
    pub port_type: String,
}

#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub device_id: String,
    pub baud_rate: u32,
}

/// What a device reports after it was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// One decoded line, delimiter removed.
    Line(String),
    /// Unrecoverable read fault.  No more events follow.
    Error(String),
    /// The device went away (EOF).  No more events follow.
    Closed,
}

/// Owned handle to an open device.
pub trait DeviceHandle: Send {
    /// Release the device.  Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// An open device: its event stream plus the handle that owns it.
pub struct DeviceConnection {
    pub events: mpsc::Receiver<DeviceEvent>,
    pub handle: Box<dyn DeviceHandle>,
}

/// Enumerates and opens line-oriented devices.
///
/// `open` may block (the OS driver does); async callers should run it on
/// the blocking pool.
pub trait SerialProvider: Send + Sync {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>>;

    /// Fails with `Error::DeviceUnavailable` when the device is missing,
    /// not permitted, or already claimed.
    fn open(&self, req: &OpenRequest) -> Result<DeviceConnection>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Line options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How raw bytes become lines, shared by every provider.
#[derive(Debug, Clone)]
pub struct LineOptions {
    pub delimiter: Vec<u8>,
    pub max_line_bytes: usize,
    pub read_timeout: Duration,
    pub channel_capacity: usize,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self::from(&SerialConfig::default())
    }
}

impl From<&SerialConfig> for LineOptions {
    fn from(cfg: &SerialConfig) -> Self {
        Self {
            delimiter: cfg.delimiter.as_bytes().to_vec(),
            max_line_bytes: cfg.max_line_bytes.max(1),
            read_timeout: Duration::from_millis(cfg.read_timeout_ms.max(1)),
            channel_capacity: cfg.channel_capacity.max(1),
        }
    }
}
