//! Append-only text log store.
//!
//! Each log name maps to `<dir>/<name>.<ext>`.  Writers to the same name are
//! serialized through a per-name lock and every entry goes out in a single
//! `write_all` on an append-mode handle, so readers never observe half an
//! entry.  Different names never share a lock.
//!
//! Blocking file I/O has `*_async` wrappers that hop onto the blocking pool.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use sl_domain::error::{Error, Result};
use sl_domain::trace::TraceEvent;

use crate::name::LogName;

/// Durable, append-only log files keyed by normalized name.
pub struct LogStore {
    dir: PathBuf,
    extension: String,
    writers: Mutex<HashMap<LogName, Arc<Mutex<()>>>>,
}

impl LogStore {
    /// Open (and create if needed) the log directory.
    pub fn new(dir: &Path, extension: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        tracing::info!(dir = %dir.display(), extension, "log store ready");
        Ok(Self {
            dir: dir.to_path_buf(),
            extension: extension.to_owned(),
            writers: Mutex::new(HashMap::new()),
        })
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Validate and normalize a raw log name.
    pub fn normalize(&self, raw: &str) -> Result<LogName> {
        LogName::parse(raw, &self.extension)
    }

    /// Canonical path of a normalized name.
    pub fn path_for(&self, name: &LogName) -> PathBuf {
        self.dir.join(name.as_str())
    }

    pub fn exists(&self, raw: &str) -> Result<bool> {
        let name = self.normalize(raw)?;
        Ok(self.path_for(&name).is_file())
    }

    pub async fn exists_async(&self, raw: &str) -> Result<bool> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        blocking(move || Ok(path.is_file())).await
    }

    /// Create the file for `raw` if absent and return its path.
    ///
    /// Never truncates: calling it on a file with content is a no-op.
    pub fn ensure(&self, raw: &str) -> Result<PathBuf> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        let lock = self.writer_lock(&name);
        let result = {
            let _guard = lock.lock();
            open_append(&path).map(|_| path)
        };
        drop(lock);
        self.prune_idle();
        result
    }

    /// [`ensure`](Self::ensure) on the blocking pool.
    pub async fn ensure_async(&self, raw: &str) -> Result<PathBuf> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        let lock = self.writer_lock(&name);

        let result = blocking(move || {
            let _guard = lock.lock();
            open_append(&path).map(|_| path)
        })
        .await;
        self.prune_idle();
        result
    }

    /// Append one timestamped entry to `raw` (sync).
    pub fn append(&self, raw: &str, text: &str) -> Result<()> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        let entry = format_entry(text, Utc::now());
        let lock = self.writer_lock(&name);

        let result = {
            let _guard = lock.lock();
            write_entry(&path, &entry)
        };
        drop(lock);
        self.prune_idle();

        result?;
        emit_append(&name, entry.len());
        Ok(())
    }

    /// Append one timestamped entry to `raw` (async).
    pub async fn append_async(&self, raw: &str, text: &str) -> Result<()> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        let entry = format_entry(text, Utc::now());
        let lock = self.writer_lock(&name);
        let bytes = entry.len();

        let result = blocking(move || {
            let _guard = lock.lock();
            write_entry(&path, &entry)
        })
        .await;
        self.prune_idle();

        result?;
        emit_append(&name, bytes);
        Ok(())
    }

    /// Full content of `raw`, or an empty string when the file does not
    /// exist yet.
    pub fn read_all(&self, raw: &str) -> Result<String> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        if !path.is_file() {
            return Ok(String::new());
        }

        let lock = self.writer_lock(&name);
        let result = {
            let _guard = lock.lock();
            read_text(&path)
        };
        drop(lock);
        self.prune_idle();
        result
    }

    /// Full content of `raw` (async).
    pub async fn read_all_async(&self, raw: &str) -> Result<String> {
        let name = self.normalize(raw)?;
        let path = self.path_for(&name);
        let check = path.clone();
        if !blocking(move || Ok(check.is_file())).await? {
            return Ok(String::new());
        }

        let lock = self.writer_lock(&name);
        let result = blocking(move || {
            let _guard = lock.lock();
            read_text(&path)
        })
        .await;
        self.prune_idle();
        result
    }

    // ── Private helpers ───────────────────────────────────────────────

    fn writer_lock(&self, name: &LogName) -> Arc<Mutex<()>> {
        self.writers
            .lock()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop locks nobody outside the map holds.
    fn prune_idle(&self) {
        self.writers
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
}

/// Render one log entry: `[<timestamp>] <text>\n`.
///
/// Trailing line breaks are dropped and interior ones folded to a space so
/// that one call is always exactly one line in the file.
pub fn format_entry(text: &str, at: DateTime<Utc>) -> String {
    let body = text
        .trim_end_matches(['\r', '\n'])
        .replace("\r\n", " ")
        .replace(['\r', '\n'], " ");
    format!(
        "[{}] {}\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        body
    )
}

fn open_append(path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::Io)
}

fn write_entry(path: &Path, entry: &str) -> Result<()> {
    let mut file = open_append(path)?;
    file.write_all(entry.as_bytes()).map_err(Error::Io)?;
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::Io(e)),
    }
}

fn emit_append(name: &LogName, bytes: usize) {
    TraceEvent::LogAppend {
        log_name: name.to_string(),
        bytes,
    }
    .emit();
}
