/// Shared error type used across all SerialLog crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A log name that is empty, malformed, or would escape the log directory.
    #[error("invalid log name: {0}")]
    InvalidName(String),

    #[error("device {0} is already open")]
    AlreadyOpen(String),

    #[error("device {device} unavailable: {message}")]
    DeviceUnavailable { device: String, message: String },

    /// Hard fault while closing a device. The session is gone regardless.
    #[error("closing {device}: {message}")]
    Close { device: String, message: String },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("device {0} is not open")]
    NotOpen(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_device() {
        let err = Error::DeviceUnavailable {
            device: "COM1".into(),
            message: "permission denied".into(),
        };
        assert_eq!(err.to_string(), "device COM1 unavailable: permission denied");
        assert_eq!(Error::AlreadyOpen("COM1".into()).to_string(), "device COM1 is already open");
    }

    #[test]
    fn io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
