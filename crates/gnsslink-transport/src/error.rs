use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in receiver transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// The connection attempt did not complete in time.
    #[error("connect to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// Failed to open or configure a serial device.
    #[error("failed to open serial port {port}: {source}")]
    Serial {
        port: String,
        source: tokio_serial::Error,
    },

    /// Failed to open a recorded log file for replay.
    #[error("failed to open replay file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The port identifier passed to `set_port` cannot be used by this transport.
    #[error("invalid port identifier '{0}'")]
    InvalidPort(String),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
