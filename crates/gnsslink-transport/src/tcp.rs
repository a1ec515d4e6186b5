use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportKind};

/// Default receiver IP port for command and data connections.
pub const DEFAULT_TCP_PORT: u16 = 28784;

/// Configuration for a TCP link.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Receiver host name or address.
    pub host: String,
    /// Receiver TCP port.
    pub port: u16,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
}

impl TcpConfig {
    /// Create a config for `host:port` with the default connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            host: "192.168.3.1".to_string(),
            port: DEFAULT_TCP_PORT,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// TCP transport to a receiver.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    /// Create a TCP transport.
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn connect(&mut self) -> Result<TcpStream> {
        let endpoint = self.endpoint();
        let attempt = TcpStream::connect((self.config.host.as_str(), self.config.port));
        let stream = match tokio::time::timeout(self.config.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { endpoint, source }),
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    endpoint,
                    timeout: self.config.connect_timeout,
                })
            }
        };

        // Commands are short; do not let Nagle hold them back.
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "failed to disable Nagle on receiver socket");
        }

        info!(%endpoint, "connected to receiver over tcp");
        Ok(stream)
    }

    /// Accepts `host:port` or a bare port number.
    fn set_port(&mut self, port: &str) -> Result<()> {
        let port = port.trim();
        match port.rsplit_once(':') {
            Some((host, number)) => {
                let number = number
                    .parse::<u16>()
                    .map_err(|_| TransportError::InvalidPort(port.to_string()))?;
                if host.is_empty() {
                    return Err(TransportError::InvalidPort(port.to_string()));
                }
                self.config.host = host.to_string();
                self.config.port = number;
            }
            None => {
                self.config.port = port
                    .parse::<u16>()
                    .map_err(|_| TransportError::InvalidPort(port.to_string()))?;
            }
        }
        debug!(endpoint = %self.endpoint(), "tcp endpoint updated");
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}
