use std::io::{ErrorKind, Read};
use std::time::SystemTime;

use crate::error::{FrameError, Result};
use crate::framer::{Framer, FramerConfig, FramingStats};
use crate::telegram::Telegram;

/// Reads complete telegrams from any blocking `Read` stream.
///
/// Each read asks the stream for at most the bytes the framer needs next, so
/// nothing is ever read past the end of a telegram.
pub struct TelegramReader<T> {
    inner: T,
    framer: Framer,
    scratch: Vec<u8>,
}

impl<T: Read> TelegramReader<T> {
    /// Create a telegram reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FramerConfig::default())
    }

    /// Create a telegram reader with explicit configuration.
    pub fn with_config(inner: T, config: FramerConfig) -> Self {
        Self {
            inner,
            framer: Framer::with_config(config),
            scratch: Vec::new(),
        }
    }

    /// Read the next complete telegram (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. Read
    /// timeouts (`WouldBlock`, `TimedOut`) are returned without disturbing the
    /// telegram in progress; any other I/O error drops it.
    pub fn read_telegram(&mut self) -> Result<Telegram> {
        loop {
            let wanted = self.framer.wanted();
            if self.scratch.len() < wanted {
                self.scratch.resize(wanted, 0);
            }

            let read = match self.inner.read(&mut self.scratch[..wanted]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(FrameError::Io(err));
                }
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

            let (used, telegram) = self.framer.push(&self.scratch[..read], SystemTime::now());
            debug_assert_eq!(used, read);
            if let Some(telegram) = telegram {
                return Ok(telegram);
            }
        }
    }

    /// Counters of the underlying framer.
    pub fn stats(&self) -> FramingStats {
        self.framer.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for TelegramReader<T> {
    type Item = Result<Telegram>;

    /// Yields telegrams until the stream closes.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_telegram() {
            Err(FrameError::ConnectionClosed { .. }) => None,
            other => Some(other),
        }
    }
}
