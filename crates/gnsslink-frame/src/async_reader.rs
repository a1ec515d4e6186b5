use std::io::ErrorKind;
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{FrameError, Result};
use crate::framer::{Framer, FramerConfig, FramingStats};
use crate::telegram::Telegram;

/// Async counterpart of [`TelegramReader`](crate::TelegramReader).
///
/// `read_telegram` is cancel-safe: the partial telegram lives in the framer,
/// not in the future, so dropping the future between reads (for example when
/// it loses a `tokio::select!` race) loses no bytes.
pub struct AsyncTelegramReader<T> {
    inner: T,
    framer: Framer,
    scratch: Vec<u8>,
}

impl<T: AsyncRead + Unpin> AsyncTelegramReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FramerConfig::default())
    }

    pub fn with_config(inner: T, config: FramerConfig) -> Self {
        Self {
            inner,
            framer: Framer::with_config(config),
            scratch: Vec::new(),
        }
    }

    /// Read the next complete telegram.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF.
    pub async fn read_telegram(&mut self) -> Result<Telegram> {
        loop {
            let wanted = self.framer.wanted();
            if self.scratch.len() < wanted {
                self.scratch.resize(wanted, 0);
            }

            let read = match self.inner.read(&mut self.scratch[..wanted]).await {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.framer.abort(0);
                    return Err(FrameError::Io(err));
                }
            };

            if read == 0 {
                let pending = self.framer.pending();
                self.framer.abort(0);
                return Err(FrameError::ConnectionClosed { pending });
            }

            let (_, telegram) = self.framer.push(&self.scratch[..read], SystemTime::now());
            if let Some(telegram) = telegram {
                return Ok(telegram);
            }
        }
    }

    pub fn stats(&self) -> FramingStats {
        self.framer.stats()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}
