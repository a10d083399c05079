use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log files
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Directory holding every log file.  Created on startup.
    #[serde(default = "d_dir")]
    pub dir: PathBuf,
    /// Reserved extension (without the leading dot) every log name is
    /// normalized to.
    #[serde(default = "d_extension")]
    pub extension: String,
    /// Process-wide default log name.  When unset, a `yyyymmddhhmm` name is
    /// generated from local time at startup.
    #[serde(default)]
    pub default_name: Option<String>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: d_dir(),
            extension: d_extension(),
            default_name: None,
        }
    }
}

fn d_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn d_extension() -> String {
    "txt".into()
}
