//! Log name normalization.

use std::fmt;

use chrono::{DateTime, TimeZone};
use sl_domain::error::{Error, Result};

/// Longest accepted file name, extension included.
const MAX_NAME_BYTES: usize = 255;

/// A validated log file name with the reserved extension applied.
///
/// `sessionA` and `sessionA.txt` normalize to the same `LogName`, so they
/// address the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogName(String);

impl LogName {
    /// Normalize `raw` to `<stem>.<extension>` and reject anything that could
    /// leave the log directory.
    pub fn parse(raw: &str, extension: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidName("name is empty".into()));
        }
        if trimmed.contains("..") || trimmed.contains(['/', '\\']) {
            return Err(Error::InvalidName(format!(
                "{trimmed:?} contains a path separator or traversal sequence"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(Error::InvalidName(format!(
                "{trimmed:?} contains control characters"
            )));
        }

        let suffix = format!(".{extension}");
        let file_name = if trimmed.ends_with(&suffix) {
            trimmed.to_owned()
        } else {
            format!("{trimmed}{suffix}")
        };

        let stem = &file_name[..file_name.len() - suffix.len()];
        if stem.is_empty() || stem == "." {
            return Err(Error::InvalidName(format!("{trimmed:?} has no stem")));
        }
        if file_name.len() > MAX_NAME_BYTES {
            return Err(Error::InvalidName(format!(
                "name exceeds {MAX_NAME_BYTES} bytes"
            )));
        }

        Ok(Self(file_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name used when nobody picked one: `yyyymmddhhmm` in the given clock's
/// timezone.
pub fn default_log_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    now.format("%Y%m%d%H%M").to_string()
}
