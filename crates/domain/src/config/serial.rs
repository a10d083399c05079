use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Serial devices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which device backend the gateway opens sessions against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerialProviderKind {
    /// Real ports via the OS serial driver.
    #[default]
    System,
    /// In-memory ports, for demos and tests without hardware.
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub provider: SerialProviderKind,
    /// Used when a connect request omits the baud rate (or sends 0).
    #[serde(default = "d_baud")]
    pub default_baud_rate: u32,
    /// Line delimiter the device stream is split on.
    #[serde(default = "d_delimiter")]
    pub delimiter: String,
    /// Read timeout of the blocking port read; bounds how quickly a close
    /// is noticed by the reader thread.
    #[serde(default = "d_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Lines longer than this are force-split.
    #[serde(default = "d_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Capacity of the per-device event channel between reader and ingress.
    #[serde(default = "d_channel_capacity")]
    pub channel_capacity: usize,
    /// Port paths advertised by the mock provider.
    #[serde(default = "d_mock_ports")]
    pub mock_ports: Vec<String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            provider: SerialProviderKind::default(),
            default_baud_rate: d_baud(),
            delimiter: d_delimiter(),
            read_timeout_ms: d_read_timeout_ms(),
            max_line_bytes: d_max_line_bytes(),
            channel_capacity: d_channel_capacity(),
            mock_ports: d_mock_ports(),
        }
    }
}

fn d_baud() -> u32 {
    9600
}
fn d_delimiter() -> String {
    "\r\n".into()
}
fn d_read_timeout_ms() -> u64 {
    100
}
fn d_max_line_bytes() -> usize {
    64 * 1024
}
fn d_channel_capacity() -> usize {
    256
}
fn d_mock_ports() -> Vec<String> {
    vec!["MOCK0".into()]
}
