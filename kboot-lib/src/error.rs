use std::path::PathBuf;

use thiserror::Error;

use crate::bootloader::Status;
use crate::image::{DecodeError, EncodeError};

/// Convenient result type for `kboot-lib`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("file not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("could not read from file {}: {source}", path.display())]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write to file {}: {source}", path.display())]
    ImageUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt image {}: {source}", path.display())]
    CorruptImage {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("could not encode image for {}: {source}", path.display())]
    ImageEncode {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },

    #[error("no MCU with KBoot detected (VID 0x{vid:04X}, PID 0x{pid:04X})")]
    NoDeviceFound { vid: u16, pid: u16 },

    #[error("device selection '{selection}' is out of range (0..{count})")]
    SelectionOutOfRange { selection: String, count: usize },

    #[error("failed to connect to {device}: {reason}")]
    ConnectFailed { device: String, reason: String },

    #[error("{operation} failed with status {status}")]
    DeviceOperationFailed {
        operation: &'static str,
        status: Status,
    },

    #[error("invalid backdoor key: {0}")]
    KeyFormatInvalid(String),

    #[error("no device connected")]
    NotConnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::ArgumentInvalid(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::KeyFormatInvalid(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn connect_failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Turn a non-success device status into an error, passing success through.
    pub fn check_status(operation: &'static str, status: Status) -> Result<Status> {
        if status.is_success() {
            Ok(status)
        } else {
            Err(Self::DeviceOperationFailed { operation, status })
        }
    }
}
