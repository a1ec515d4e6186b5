use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportKind};

/// Replays a recorded receiver log as if it were a live link.
///
/// The file holds the raw byte stream exactly as the receiver sent it. Reaching
/// end-of-file ends the stream, which the supervisor treats as completion when
/// running in replay mode.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    path: PathBuf,
}

impl ReplayTransport {
    /// Create a replay transport for the log at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for ReplayTransport {
    type Stream = ReplayStream;

    async fn connect(&mut self) -> Result<ReplayStream> {
        let file = File::open(&self.path)
            .await
            .map_err(|source| TransportError::Open {
                path: self.path.clone(),
                source,
            })?;
        info!(path = ?self.path, "replaying receiver log");
        Ok(ReplayStream { file, discarded: 0 })
    }

    fn set_port(&mut self, port: &str) -> Result<()> {
        if port.trim().is_empty() {
            return Err(TransportError::InvalidPort(port.to_string()));
        }
        self.path = PathBuf::from(port.trim());
        debug!(path = ?self.path, "replay file updated");
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Replay
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }
}

/// Read side of a replayed log.
///
/// Writes are accepted and dropped: there is no receiver to command.
#[derive(Debug)]
pub struct ReplayStream {
    file: File,
    discarded: u64,
}

impl ReplayStream {
    /// Number of outbound bytes dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl AsyncRead for ReplayStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl AsyncWrite for ReplayStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.discarded = self.discarded.saturating_add(buf.len() as u64);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
