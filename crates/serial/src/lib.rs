//! Line-oriented serial device access.
//!
//! A [`SerialProvider`] enumerates and opens devices.  An open device is a
//! [`DeviceConnection`]: a channel of [`DeviceEvent`]s carrying decoded
//! lines plus an owned [`DeviceHandle`] that closes the device.
//!
//! Two providers ship here: [`SystemSerialProvider`] backed by the
//! `serialport` crate, and [`MockSerialProvider`] for hardware-free runs.

pub mod framer;
pub mod mock;
pub mod provider;
pub mod system;

pub use framer::LineFramer;
pub use mock::MockSerialProvider;
pub use provider::{
    DeviceConnection, DeviceEvent, DeviceHandle, LineOptions, OpenRequest, PortDescriptor,
    SerialProvider,
};
pub use system::SystemSerialProvider;
