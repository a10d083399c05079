//! Per-session ingress task: device events in, log entries out.
//!
//! The task owns the receiving end of the device channel.  It never closes
//! the device; when the device errors or goes away it reports a
//! [`Termination`] and exits, and the registry tears the session down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sl_logstore::{LogName, LogStore};
use sl_serial::DeviceEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why an ingress task stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressExit {
    /// The registry asked it to stop (explicit close or shutdown).
    Cancelled,
    /// The device reported end of stream or its channel closed.
    DeviceClosed,
    /// The device reported an unrecoverable read fault.
    DeviceError(String),
}

impl IngressExit {
    pub fn reason(&self) -> String {
        match self {
            Self::Cancelled => "cancelled".into(),
            Self::DeviceClosed => "device closed".into(),
            Self::DeviceError(msg) => format!("device error: {msg}"),
        }
    }
}

/// Device-driven end of a session, delivered to the registry's reaper.
#[derive(Debug)]
pub(crate) struct Termination {
    pub device_id: String,
    pub session_id: Uuid,
    pub exit: IngressExit,
}

pub(crate) struct Ingress {
    pub device_id: String,
    pub session_id: Uuid,
    pub events: mpsc::Receiver<DeviceEvent>,
    /// Shared with the session; read fresh for every line.
    pub log_name: Arc<RwLock<LogName>>,
    pub store: Arc<LogStore>,
    pub lines_logged: Arc<AtomicU64>,
    pub cancel: CancellationToken,
    pub terminations: mpsc::UnboundedSender<Termination>,
}

impl Ingress {
    pub(crate) async fn run(mut self) -> IngressExit {
        let exit = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break IngressExit::Cancelled,
                event = self.events.recv() => event,
            };

            match event {
                Some(DeviceEvent::Line(line)) => self.append(&line).await,
                Some(DeviceEvent::Error(message)) => break IngressExit::DeviceError(message),
                Some(DeviceEvent::Closed) | None => break IngressExit::DeviceClosed,
            }
        };

        tracing::debug!(
            device = %self.device_id,
            session_id = %self.session_id,
            reason = %exit.reason(),
            "ingress stopped"
        );

        if exit != IngressExit::Cancelled {
            // The reaper is gone only when the registry itself was dropped.
            let _ = self.terminations.send(Termination {
                device_id: self.device_id.clone(),
                session_id: self.session_id,
                exit: exit.clone(),
            });
        }
        exit
    }

    async fn append(&self, line: &str) {
        let name = self.log_name.read().clone();
        match self.store.append_async(name.as_str(), line).await {
            Ok(()) => {
                self.lines_logged.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(
                    device = %self.device_id,
                    log_name = %name,
                    error = %e,
                    "dropping line: append failed"
                );
            }
        }
    }
}
