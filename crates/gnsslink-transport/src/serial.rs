use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportKind};

/// Configuration for a serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    /// Line rate in baud.
    pub baud_rate: u32,
    /// Use RTS/CTS hardware flow control.
    pub hw_flow_control: bool,
}

impl SerialConfig {
    /// Create a config for `port` at `baud_rate`, 8N1, no flow control.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            hw_flow_control: false,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("/dev/ttyACM0", 921_600)
    }
}

/// Serial-port transport to a receiver.
///
/// The port is always opened 8N1.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    config: SerialConfig,
}

impl SerialTransport {
    /// Create a serial transport.
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    type Stream = SerialStream;

    async fn connect(&mut self) -> Result<SerialStream> {
        let flow_control = if self.config.hw_flow_control {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };

        let stream = tokio_serial::new(self.config.port.as_str(), self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(flow_control)
            .open_native_async()
            .map_err(|source| TransportError::Serial {
                port: self.config.port.clone(),
                source,
            })?;

        info!(
            port = %self.config.port,
            baud = self.config.baud_rate,
            "opened receiver serial port"
        );
        Ok(stream)
    }

    fn set_port(&mut self, port: &str) -> Result<()> {
        let port = port.trim();
        if port.is_empty() {
            return Err(TransportError::InvalidPort(port.to_string()));
        }
        self.config.port = port.to_string();
        debug!(port = %self.config.port, "serial port updated");
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.config.port, self.config.baud_rate)
    }
}
