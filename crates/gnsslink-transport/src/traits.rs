use std::fmt;
use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// The family a transport belongs to.
///
/// Supervision policy depends on it: only stream-oriented links get a liveness
/// byte, and only replay links treat end-of-stream as completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// TCP socket to the receiver.
    Tcp,
    /// Serial device.
    Serial,
    /// Recorded log file.
    Replay,
}

impl TransportKind {
    /// Whether a silently dead peer can only be detected by writing to it.
    pub fn needs_keepalive(self) -> bool {
        matches!(self, TransportKind::Tcp)
    }

    /// Transport name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Serial => "serial",
            TransportKind::Replay => "replay",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A way of reaching the receiver.
///
/// A transport is a reusable connector: every successful [`connect`](Transport::connect)
/// yields a fresh duplex [`Stream`](Transport::Stream). Reads and writes go
/// through the stream's `AsyncRead`/`AsyncWrite` implementations, and closing the
/// link is dropping (or shutting down) the stream. The supervisor calls `connect`
/// again on the same transport to reconnect.
pub trait Transport: Send + 'static {
    /// The connected byte stream.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open the link.
    fn connect(&mut self) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Change the endpoint used by the next `connect`.
    fn set_port(&mut self, port: &str) -> Result<()>;

    /// The transport family.
    fn kind(&self) -> TransportKind;

    /// Human-readable endpoint for log messages.
    fn endpoint(&self) -> String;
}
