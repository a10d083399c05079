//! Registry of open device sessions.
//!
//! One entry per device id, guarded by a single mutex.  Opens reserve the
//! device id under that mutex before touching the hardware so two racing
//! opens of the same device can never both succeed.  Device-driven
//! teardown never mutates the map from the ingress task: the task sends a
//! [`Termination`] to the registry's reaper, which removes the entry only if
//! it still belongs to the session that ended.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sl_domain::error::{Error, Result};
use sl_domain::trace::TraceEvent;
use sl_logstore::{LogName, LogStore};
use sl_serial::{DeviceHandle, OpenRequest, SerialProvider};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ingress::{Ingress, IngressExit, Termination};
use crate::status::SessionStatus;

/// Registry-wide defaults, usually taken from `[serial]` and `[logs]`.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Used when an open request carries a baud rate of 0.
    pub default_baud_rate: u32,
    /// Reported by status when no session is open.
    pub default_log_name: LogName,
}

/// Result of [`SessionRegistry::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// Nothing was open for that device.
    NotOpen,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Session {
    session_id: Uuid,
    device_id: String,
    baud_rate: u32,
    log_name: Arc<RwLock<LogName>>,
    opened_at: DateTime<Utc>,
    lines_logged: Arc<AtomicU64>,
    handle: Box<dyn DeviceHandle>,
    cancel: CancellationToken,
    task: JoinHandle<IngressExit>,
}

impl Session {
    /// A session whose ingress task has already exited is dead even if the
    /// reaper has not removed it yet.
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            device_id: self.device_id.clone(),
            log_name: self.log_name.read().to_string(),
            baud_rate: self.baud_rate,
            session_id: self.session_id.to_string(),
            opened_at: self.opened_at,
            lines_logged: self.lines_logged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Slots {
    sessions: HashMap<String, Session>,
    /// Device ids with an open in progress.
    opening: HashSet<String>,
}

/// Releases an open reservation however the open ends.
struct Reservation<'a> {
    slots: &'a Mutex<Slots>,
    device_id: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.slots.lock().opening.remove(self.device_id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns every open device session.
pub struct SessionRegistry {
    store: Arc<LogStore>,
    provider: Arc<dyn SerialProvider>,
    default_baud_rate: u32,
    default_log_name: RwLock<LogName>,
    slots: Mutex<Slots>,
    terminations: mpsc::UnboundedSender<Termination>,
}

impl SessionRegistry {
    /// Build the registry and start its reaper task.  Must be called from
    /// within a Tokio runtime.
    pub fn new(
        store: Arc<LogStore>,
        provider: Arc<dyn SerialProvider>,
        settings: RegistrySettings,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            store,
            provider,
            default_baud_rate: settings.default_baud_rate,
            default_log_name: RwLock::new(settings.default_log_name),
            slots: Mutex::new(Slots::default()),
            terminations: tx,
        });
        tokio::spawn(reap_terminated(Arc::downgrade(&registry), rx));
        registry
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    /// Open `device_id` and start logging its lines to `log_name`.
    ///
    /// Fails with `AlreadyOpen` while another session (or another open)
    /// holds the device, `InvalidName` before any I/O when the log name is
    /// unusable, and `DeviceUnavailable` when the provider cannot open it.
    pub async fn open(
        &self,
        device_id: &str,
        baud_rate: u32,
        log_name: &str,
    ) -> Result<SessionStatus> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(Error::MissingField("path"));
        }
        if log_name.trim().is_empty() {
            return Err(Error::MissingField("logName"));
        }
        let name = self.store.normalize(log_name)?;
        let baud_rate = if baud_rate == 0 {
            self.default_baud_rate
        } else {
            baud_rate
        };

        let stale = {
            let mut slots = self.slots.lock();
            let busy = slots.opening.contains(device_id)
                || slots.sessions.get(device_id).is_some_and(Session::is_live);
            if busy {
                return Err(Error::AlreadyOpen(device_id.to_owned()));
            }
            slots.opening.insert(device_id.to_owned());
            slots.sessions.remove(device_id)
        };
        let _reservation = Reservation {
            slots: &self.slots,
            device_id,
        };

        if let Some(stale) = stale {
            tracing::debug!(device = %device_id, "releasing dead session before reopen");
            if let Err(e) = self.finish(stale).await {
                tracing::warn!(device = %device_id, error = %e, "closing dead session failed");
            }
        }

        self.store.ensure_async(name.as_str()).await?;

        let provider = self.provider.clone();
        let request = OpenRequest {
            device_id: device_id.to_owned(),
            baud_rate,
        };
        let connection = tokio::task::spawn_blocking(move || provider.open(&request))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        let session_id = Uuid::new_v4();
        let shared_name = Arc::new(RwLock::new(name.clone()));
        let lines_logged = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        // Spawn and insert under the lock so a termination from a device
        // that dies instantly always finds its entry.
        let status = {
            let mut slots = self.slots.lock();
            let task = tokio::spawn(
                Ingress {
                    device_id: device_id.to_owned(),
                    session_id,
                    events: connection.events,
                    log_name: shared_name.clone(),
                    store: self.store.clone(),
                    lines_logged: lines_logged.clone(),
                    cancel: cancel.clone(),
                    terminations: self.terminations.clone(),
                }
                .run(),
            );
            let session = Session {
                session_id,
                device_id: device_id.to_owned(),
                baud_rate,
                log_name: shared_name,
                opened_at: Utc::now(),
                lines_logged,
                handle: connection.handle,
                cancel,
                task,
            };
            let status = session.status();
            slots.sessions.insert(device_id.to_owned(), session);
            status
        };

        TraceEvent::SessionOpened {
            device: device_id.to_owned(),
            session_id: status.session_id.clone(),
            baud_rate,
            log_name: name.to_string(),
        }
        .emit();
        tracing::info!(
            device = %device_id,
            baud_rate,
            log_name = %name,
            "session opened"
        );

        Ok(status)
    }

    /// Close the session for `device_id`.
    ///
    /// Returns `NotOpen` when nothing was open.  The entry is removed before
    /// the device is released, so a close fault (`Error::Close`) never
    /// leaves a stuck entry behind.
    pub async fn close(&self, device_id: &str) -> Result<CloseOutcome> {
        let device_id = device_id.trim();
        let session = self.slots.lock().sessions.remove(device_id);
        let Some(session) = session else {
            tracing::debug!(device = %device_id, "close: no open session");
            return Ok(CloseOutcome::NotOpen);
        };

        self.finish(session).await?;
        Ok(CloseOutcome::Closed)
    }

    /// Close every open session.  Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let sessions: Vec<Session> = self
            .slots
            .lock()
            .sessions
            .drain()
            .map(|(_, s)| s)
            .collect();
        let count = sessions.len();

        for session in sessions {
            let device = session.device_id.clone();
            if let Err(e) = self.finish(session).await {
                tracing::warn!(device = %device, error = %e, "close during shutdown failed");
            }
        }
        count
    }

    /// Point future lines of `device_id` at `log_name`.  Lines already
    /// written stay where they are.
    pub async fn set_log_name(&self, device_id: &str, log_name: &str) -> Result<LogName> {
        let device_id = device_id.trim();
        let name = self.store.normalize(log_name)?;

        let shared = self
            .slots
            .lock()
            .sessions
            .get(device_id)
            .filter(|s| s.is_live())
            .map(|s| s.log_name.clone())
            .ok_or_else(|| Error::NotOpen(device_id.to_owned()))?;

        self.store.ensure_async(name.as_str()).await?;
        let old = std::mem::replace(&mut *shared.write(), name.clone());

        TraceEvent::LogNameChanged {
            device: device_id.to_owned(),
            old_name: old.to_string(),
            new_name: name.to_string(),
        }
        .emit();
        Ok(name)
    }

    pub fn default_log_name(&self) -> LogName {
        self.default_log_name.read().clone()
    }

    pub fn set_default_log_name(&self, log_name: &str) -> Result<LogName> {
        let name = self.store.normalize(log_name)?;
        *self.default_log_name.write() = name.clone();
        tracing::info!(log_name = %name, "default log name changed");
        Ok(name)
    }

    /// Live sessions, ordered by device id.
    pub(crate) fn live_sessions(&self) -> Vec<SessionStatus> {
        let mut out: Vec<SessionStatus> = self
            .slots
            .lock()
            .sessions
            .values()
            .filter(|s| s.is_live())
            .map(Session::status)
            .collect();
        out.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        out
    }

    pub fn session(&self, device_id: &str) -> Option<SessionStatus> {
        self.slots
            .lock()
            .sessions
            .get(device_id.trim())
            .filter(|s| s.is_live())
            .map(Session::status)
    }

    pub fn is_open(&self, device_id: &str) -> bool {
        self.session(device_id).is_some()
    }

    // ── Teardown ──────────────────────────────────────────────────────

    /// Stop ingress, release the device and report the close.  The caller
    /// has already removed `session` from the map.
    async fn finish(&self, session: Session) -> Result<()> {
        let Session {
            session_id,
            device_id,
            lines_logged,
            handle,
            cancel,
            task,
            ..
        } = session;

        cancel.cancel();
        if let Err(e) = task.await {
            tracing::warn!(device = %device_id, error = %e, "ingress task failed");
        }

        let result = close_handle(&device_id, handle).await;

        TraceEvent::SessionClosed {
            device: device_id.clone(),
            session_id: session_id.to_string(),
            lines_logged: lines_logged.load(Ordering::Relaxed),
        }
        .emit();
        match &result {
            Ok(()) => tracing::info!(device = %device_id, "session closed"),
            Err(e) => tracing::warn!(device = %device_id, error = %e, "session closed with fault"),
        }
        result
    }

    async fn reap(&self, termination: Termination) {
        let session = {
            let mut slots = self.slots.lock();
            match slots.sessions.get(&termination.device_id) {
                Some(s) if s.session_id == termination.session_id => {
                    slots.sessions.remove(&termination.device_id)
                }
                _ => None,
            }
        };
        let Some(session) = session else {
            tracing::debug!(
                device = %termination.device_id,
                "termination for a session that is already gone"
            );
            return;
        };

        TraceEvent::SessionTerminated {
            device: termination.device_id.clone(),
            session_id: termination.session_id.to_string(),
            reason: termination.exit.reason(),
        }
        .emit();
        tracing::warn!(
            device = %termination.device_id,
            reason = %termination.exit.reason(),
            "session ended by device"
        );

        if let Err(e) = self.finish(session).await {
            tracing::warn!(device = %termination.device_id, error = %e, "releasing device failed");
        }
    }
}

async fn close_handle(device_id: &str, mut handle: Box<dyn DeviceHandle>) -> Result<()> {
    tokio::task::spawn_blocking(move || handle.close())
        .await
        .map_err(|e| Error::Close {
            device: device_id.to_owned(),
            message: format!("close task failed: {e}"),
        })?
}

async fn reap_terminated(
    registry: Weak<SessionRegistry>,
    mut rx: mpsc::UnboundedReceiver<Termination>,
) {
    while let Some(termination) = rx.recv().await {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        registry.reap(termination).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sl_serial::MockSerialProvider;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        mock: MockSerialProvider,
        registry: Arc<SessionRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(LogStore::new(dir.path(), "txt").unwrap());
            let mock = MockSerialProvider::new(["COM1", "COM2"]);
            let registry = SessionRegistry::new(
                store,
                Arc::new(mock.clone()),
                RegistrySettings {
                    default_baud_rate: 9600,
                    default_log_name: LogName::parse("default", "txt").unwrap(),
                },
            );
            Self {
                _dir: dir,
                mock,
                registry,
            }
        }

        fn read(&self, name: &str) -> String {
            self.registry.store().read_all(name).unwrap()
        }

        fn bodies(&self, name: &str) -> Vec<String> {
            self.read(name)
                .lines()
                .map(|l| l.split_once("] ").unwrap().1.to_owned())
                .collect()
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn device_lines_land_in_order() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "run").await.unwrap();

        for line in ["one", "two", "three"] {
            assert!(f.mock.push_line("COM1", line).await);
        }
        wait_until(|| f.bodies("run").len() == 3).await;
        assert_eq!(f.bodies("run"), vec!["one", "two", "three"]);
        assert_eq!(f.registry.session("COM1").unwrap().lines_logged, 3);
    }

    #[tokio::test]
    async fn open_creates_log_file() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "fresh").await.unwrap();
        assert!(f.registry.store().exists("fresh").unwrap());
        assert_eq!(f.read("fresh"), "");
    }

    #[tokio::test]
    async fn second_open_is_rejected_and_first_keeps_running() {
        let f = Fixture::new();
        let first = f.registry.open("COM1", 9600, "a").await.unwrap();

        let err = f.registry.open("COM1", 115_200, "b").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyOpen(_)));

        let still = f.registry.session("COM1").unwrap();
        assert_eq!(still.session_id, first.session_id);
        assert_eq!(still.log_name, "a.txt");

        f.mock.push_line("COM1", "after reject").await;
        wait_until(|| f.bodies("a").len() == 1).await;
        assert!(!f.registry.store().exists("b").unwrap());
    }

    #[tokio::test]
    async fn close_unknown_device_is_a_noop() {
        let f = Fixture::new();
        assert!(f.registry.live_sessions().is_empty());
        assert_eq!(f.registry.close("COM9").await.unwrap(), CloseOutcome::NotOpen);
        assert!(f.registry.live_sessions().is_empty());
    }

    #[tokio::test]
    async fn close_releases_device_and_stops_logging() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "run").await.unwrap();
        f.mock.push_line("COM1", "before").await;
        wait_until(|| f.bodies("run").len() == 1).await;

        assert_eq!(f.registry.close("COM1").await.unwrap(), CloseOutcome::Closed);
        assert!(!f.registry.is_open("COM1"));
        assert!(!f.mock.is_open("COM1"));
        assert_eq!(f.mock.close_count("COM1"), 1);
        assert!(!f.mock.push_line("COM1", "after").await);
        assert_eq!(f.bodies("run"), vec!["before"]);

        assert_eq!(f.registry.close("COM1").await.unwrap(), CloseOutcome::NotOpen);
    }

    #[tokio::test]
    async fn rename_routes_only_future_lines() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "first").await.unwrap();
        f.mock.push_line("COM1", "old").await;
        wait_until(|| f.bodies("first").len() == 1).await;

        let name = f.registry.set_log_name("COM1", "second").await.unwrap();
        assert_eq!(name.as_str(), "second.txt");
        f.mock.push_line("COM1", "new").await;
        wait_until(|| f.bodies("second").len() == 1).await;

        assert_eq!(f.bodies("first"), vec!["old"]);
        assert_eq!(f.bodies("second"), vec!["new"]);
        assert_eq!(f.registry.session("COM1").unwrap().log_name, "second.txt");
    }

    #[tokio::test]
    async fn rename_unknown_device_fails() {
        let f = Fixture::new();
        assert!(matches!(
            f.registry.set_log_name("COM1", "x").await,
            Err(Error::NotOpen(_))
        ));
        assert!(!f.registry.store().exists("x").unwrap());
    }

    #[tokio::test]
    async fn device_error_removes_session() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "a").await.unwrap();
        f.registry.open("COM2", 9600, "b").await.unwrap();

        f.mock.fail("COM1", "cable pulled").await;
        wait_until(|| f.mock.close_count("COM1") == 1).await;
        assert!(!f.registry.is_open("COM1"));

        // The other device is unaffected.
        assert!(f.registry.is_open("COM2"));
        f.mock.push_line("COM2", "still here").await;
        wait_until(|| f.bodies("b").len() == 1).await;

        // And the failed one can be opened again.
        f.registry.open("COM1", 9600, "a").await.unwrap();
    }

    #[tokio::test]
    async fn device_eof_removes_session() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "a").await.unwrap();
        f.mock.disconnect("COM1").await;
        wait_until(|| !f.mock.is_open("COM1")).await;
        assert!(f.registry.live_sessions().is_empty());
    }

    #[tokio::test]
    async fn close_fault_still_removes_entry() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "a").await.unwrap();
        f.mock.fail_next_close("COM1");

        let err = f.registry.close("COM1").await.unwrap_err();
        assert!(matches!(err, Error::Close { .. }));
        assert!(!f.registry.is_open("COM1"));
        f.registry.open("COM1", 9600, "a").await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_device_is_not_registered() {
        let f = Fixture::new();
        let err = f.registry.open("COM7", 9600, "a").await.unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }));
        assert!(!f.registry.is_open("COM7"));
        // The reservation is released.
        f.mock.add_port("COM7");
        f.registry.open("COM7", 9600, "a").await.unwrap();
    }

    #[tokio::test]
    async fn bad_log_name_fails_before_device_io() {
        let f = Fixture::new();
        let err = f.registry.open("COM1", 9600, "../etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
        assert!(!f.mock.is_open("COM1"));

        let err = f.registry.open("COM1", 9600, "  ").await.unwrap_err();
        assert!(matches!(err, Error::MissingField("logName")));
    }

    #[tokio::test]
    async fn zero_baud_uses_default() {
        let f = Fixture::new();
        let status = f.registry.open("COM1", 0, "a").await.unwrap();
        assert_eq!(status.baud_rate, 9600);
        assert_eq!(f.mock.last_baud_rate("COM1"), Some(9600));
    }

    #[tokio::test]
    async fn racing_opens_admit_exactly_one() {
        let f = Fixture::new();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let registry = f.registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.open("COM1", 9600, &format!("race{i}")).await
            }));
        }
        let mut ok = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, Error::AlreadyOpen(_))),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(f.registry.live_sessions().len(), 1);
    }

    #[tokio::test]
    async fn close_all_releases_everything() {
        let f = Fixture::new();
        f.registry.open("COM1", 9600, "a").await.unwrap();
        f.registry.open("COM2", 9600, "b").await.unwrap();

        assert_eq!(f.registry.close_all().await, 2);
        assert!(f.registry.live_sessions().is_empty());
        assert!(!f.mock.is_open("COM1"));
        assert!(!f.mock.is_open("COM2"));
    }
}
