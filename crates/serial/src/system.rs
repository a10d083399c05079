//! Serial ports through the OS driver (`serialport` crate).
//!
//! Each open port gets a dedicated reader thread.  The thread reads with a
//! short timeout so it can notice the stop flag, frames bytes into lines
//! and pushes them into the connection's channel.  It never closes the
//! port itself: the port is dropped when the thread exits, and the thread
//! only exits after a stop request, EOF, a read fault, or the receiver
//! going away.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use sl_domain::error::{Error, Result};
use tokio::sync::mpsc;

use crate::framer::LineFramer;
use crate::provider::{
    DeviceConnection, DeviceEvent, DeviceHandle, LineOptions, OpenRequest, PortDescriptor,
    SerialProvider,
};

/// Opens real serial ports.
pub struct SystemSerialProvider {
    options: LineOptions,
}

impl SystemSerialProvider {
    pub fn new(options: LineOptions) -> Self {
        Self { options }
    }
}

impl SerialProvider for SystemSerialProvider {
    /// On macOS only the `/dev/cu.*` call-out devices are listed; the
    /// `/dev/tty.*` twins block on open waiting for carrier detect.
    fn list_ports(&self) -> Result<Vec<PortDescriptor>> {
        let ports = serialport::available_ports()
            .map_err(|e| Error::Other(format!("enumerating serial ports: {e}")))?;

        Ok(ports
            .into_iter()
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .map(|p| {
                let (port_type, manufacturer) = match p.port_type {
                    serialport::SerialPortType::UsbPort(info) => ("USB", info.manufacturer),
                    serialport::SerialPortType::BluetoothPort => ("Bluetooth", None),
                    serialport::SerialPortType::PciPort => ("PCI", None),
                    serialport::SerialPortType::Unknown => ("Unknown", None),
                };
                PortDescriptor {
                    path: p.port_name,
                    manufacturer,
                    port_type: port_type.to_owned(),
                }
            })
            .collect())
    }

    fn open(&self, req: &OpenRequest) -> Result<DeviceConnection> {
        let port = serialport::new(&req.device_id, req.baud_rate)
            .timeout(self.options.read_timeout)
            .open()
            .map_err(|e| Error::DeviceUnavailable {
                device: req.device_id.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            device = %req.device_id,
            baud_rate = req.baud_rate,
            "serial port opened"
        );

        let (tx, rx) = mpsc::channel(self.options.channel_capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let framer = LineFramer::new(&self.options.delimiter, self.options.max_line_bytes);

        let thread = {
            let device = req.device_id.clone();
            let stop = stop.clone();
            std::thread::Builder::new()
                .name(format!("serial-{}", req.device_id))
                .spawn(move || read_loop(&device, port, framer, tx, &stop))
                .map_err(|e| Error::DeviceUnavailable {
                    device: req.device_id.clone(),
                    message: format!("spawning reader thread: {e}"),
                })?
        };

        Ok(DeviceConnection {
            events: rx,
            handle: Box::new(SystemHandle {
                device: req.device_id.clone(),
                stop,
                thread: Some(thread),
            }),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct SystemHandle {
    device: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceHandle for SystemHandle {
    /// Blocks for at most one read timeout while the reader thread winds
    /// down and drops the port.
    fn close(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.join().map_err(|_| Error::Close {
            device: self.device.clone(),
            message: "reader thread panicked".into(),
        })?;
        tracing::info!(device = %self.device, "serial port closed");
        Ok(())
    }
}

impl Drop for SystemHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reader thread
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn read_loop<R: Read>(
    device: &str,
    mut port: R,
    mut framer: LineFramer,
    tx: mpsc::Sender<DeviceEvent>,
    stop: &AtomicBool,
) {
    let mut buf = [0u8; 1024];

    loop {
        if stop.load(Ordering::Acquire) {
            tracing::debug!(device, "reader stopping on request");
            return;
        }

        match port.read(&mut buf) {
            Ok(0) => {
                if let Some(line) = framer.flush() {
                    let _ = tx.blocking_send(DeviceEvent::Line(line));
                }
                let _ = tx.blocking_send(DeviceEvent::Closed);
                tracing::info!(device, "serial port reported EOF");
                return;
            }
            Ok(n) => {
                for line in framer.feed(&buf[..n]) {
                    if tx.blocking_send(DeviceEvent::Line(line)).is_err() {
                        // Receiver dropped: the session is gone.
                        return;
                    }
                }
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::warn!(device, error = %e, "serial read failed");
                let _ = tx.blocking_send(DeviceEvent::Error(e.to_string()));
                return;
            }
        }
    }
}
