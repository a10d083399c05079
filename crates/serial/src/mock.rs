//! In-memory serial provider.
//!
//! Advertises a fixed set of port paths and lets the caller script what
//! each open device "receives": lines, read faults, or an unplug.  Used by
//! the test suites and by `provider = "mock"` deployments without hardware.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use sl_domain::error::{Error, Result};
use tokio::sync::mpsc;

use crate::provider::{
    DeviceConnection, DeviceEvent, DeviceHandle, OpenRequest, PortDescriptor, SerialProvider,
};

#[derive(Default)]
struct MockState {
    ports: Vec<String>,
    /// Open devices and the sender feeding their event channel.
    open: HashMap<String, mpsc::Sender<DeviceEvent>>,
    /// Number of successful closes per device.
    closes: HashMap<String, usize>,
    /// Devices whose next close reports a hard fault.
    fail_close: HashSet<String>,
    /// Baud rate of the most recent open per device.
    baud_rates: HashMap<String, u32>,
}

/// Scriptable provider with no hardware behind it.
#[derive(Clone)]
pub struct MockSerialProvider {
    state: Arc<Mutex<MockState>>,
    capacity: usize,
}

impl MockSerialProvider {
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Arc::new(Mutex::new(MockState {
                ports: ports.into_iter().map(Into::into).collect(),
                ..MockState::default()
            })),
            capacity: 256,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn add_port(&self, path: &str) {
        let mut state = self.state.lock();
        if !state.ports.iter().any(|p| p == path) {
            state.ports.push(path.to_owned());
        }
    }

    pub fn is_open(&self, device: &str) -> bool {
        self.state.lock().open.contains_key(device)
    }

    pub fn close_count(&self, device: &str) -> usize {
        self.state.lock().closes.get(device).copied().unwrap_or(0)
    }

    pub fn last_baud_rate(&self, device: &str) -> Option<u32> {
        self.state.lock().baud_rates.get(device).copied()
    }

    /// Make the next close of `device` report a hard fault.
    pub fn fail_next_close(&self, device: &str) {
        self.state.lock().fail_close.insert(device.to_owned());
    }

    /// Deliver a line as if the device had sent it.  Returns `false` when
    /// the device is not open or nobody is consuming it any more.
    pub async fn push_line(&self, device: &str, line: &str) -> bool {
        self.send(device, DeviceEvent::Line(line.to_owned())).await
    }

    /// Simulate an unrecoverable read fault.
    pub async fn fail(&self, device: &str, message: &str) -> bool {
        self.send(device, DeviceEvent::Error(message.to_owned())).await
    }

    /// Simulate the device going away.
    pub async fn disconnect(&self, device: &str) -> bool {
        self.send(device, DeviceEvent::Closed).await
    }

    async fn send(&self, device: &str, event: DeviceEvent) -> bool {
        let tx = self.state.lock().open.get(device).cloned();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

impl SerialProvider for MockSerialProvider {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self
            .state
            .lock()
            .ports
            .iter()
            .map(|p| PortDescriptor {
                path: p.clone(),
                manufacturer: Some("SerialLog mock".into()),
                port_type: "Mock".into(),
            })
            .collect())
    }

    fn open(&self, req: &OpenRequest) -> Result<DeviceConnection> {
        let mut state = self.state.lock();
        if !state.ports.iter().any(|p| p == &req.device_id) {
            return Err(Error::DeviceUnavailable {
                device: req.device_id.clone(),
                message: "no such port".into(),
            });
        }
        if state.open.contains_key(&req.device_id) {
            return Err(Error::DeviceUnavailable {
                device: req.device_id.clone(),
                message: "port is busy".into(),
            });
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        state.open.insert(req.device_id.clone(), tx);
        state.baud_rates.insert(req.device_id.clone(), req.baud_rate);

        Ok(DeviceConnection {
            events: rx,
            handle: Box::new(MockHandle {
                device: req.device_id.clone(),
                state: self.state.clone(),
                closed: false,
            }),
        })
    }
}

struct MockHandle {
    device: String,
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

impl DeviceHandle for MockHandle {
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut state = self.state.lock();
        state.open.remove(&self.device);
        if state.fail_close.remove(&self.device) {
            return Err(Error::Close {
                device: self.device.clone(),
                message: "simulated I/O fault".into(),
            });
        }
        *state.closes.entry(self.device.clone()).or_default() += 1;
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.state.lock().open.remove(&self.device);
        }
    }
}
