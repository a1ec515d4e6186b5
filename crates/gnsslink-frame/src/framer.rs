use std::time::SystemTime;

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::error::FramingFault;
use crate::integrity::{self, HEADER_SIZE};
use crate::sync::{self, CONNECTION_DESCRIPTOR_FOOTER, CR, LF, SYNC_BYTE_1};
use crate::telegram::{Telegram, TelegramFormat};

/// Default maximum declared binary block length: the full range of the
/// 16-bit length field.
pub const DEFAULT_MAX_BLOCK_LEN: usize = u16::MAX as usize;

/// Capacity reserved for a text line when accumulation starts.
const TEXT_CAPACITY_HINT: usize = 256;

/// Configuration for the framing state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramerConfig {
    /// Binary blocks declaring a larger total length are discarded before
    /// their body is read.
    pub max_block_len: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
        }
    }
}

/// Framing stage. Each stage knows exactly how many bytes it needs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Waiting for `$`.
    Sync0,
    /// `$` seen; waiting for the format selector.
    Sync1,
    /// Provisional text format; waiting for the confirming byte.
    Sync2,
    /// Reading the rest of the binary header.
    BinaryHeader,
    /// Reading the binary body up to the declared length.
    BinaryBody { len: usize },
    /// Reading a text line one byte at a time.
    TextAccumulate,
}

/// Running counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramingStats {
    /// Telegrams delivered.
    pub delivered: u64,
    /// Telegrams abandoned because of a framing or integrity fault.
    pub resyncs: u64,
    /// Binary blocks that failed the checksum.
    pub crc_failures: u64,
}

/// The telegram under assembly. Replaced wholesale on every resync.
#[derive(Debug)]
struct Assembly {
    buf: BytesMut,
    format: TelegramFormat,
    captured_at: SystemTime,
}

impl Assembly {
    fn new(now: SystemTime) -> Self {
        Self {
            buf: BytesMut::new(),
            format: TelegramFormat::Unknown,
            captured_at: now,
        }
    }

    /// A fresh telegram whose first byte is `$`.
    fn starting_at_sync(now: SystemTime) -> Self {
        let mut assembly = Self::new(now);
        assembly.buf.reserve(HEADER_SIZE);
        assembly.buf.extend_from_slice(&[SYNC_BYTE_1]);
        assembly
    }

    fn finish(self) -> Telegram {
        Telegram {
            bytes: self.buf.freeze(),
            format: self.format,
            captured_at: self.captured_at,
        }
    }
}

/// Byte-synchronous telegram framing state machine.
///
/// The framer does no I/O. A driver asks [`wanted`](Framer::wanted) how many
/// bytes the current stage needs, reads at most that many, and hands them to
/// [`push`](Framer::push). Text stages take one byte at a time; binary stages
/// take the rest of the header, then exactly the rest of the declared length.
/// Malformed input never surfaces as an error: the framer logs the fault,
/// drops the telegram in progress and starts over at [`FramerState::Sync0`].
#[derive(Debug)]
pub struct Framer {
    config: FramerConfig,
    state: FramerState,
    telegram: Assembly,
    stats: FramingStats,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create a framer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            config,
            state: FramerState::Sync0,
            telegram: Assembly::new(SystemTime::now()),
            stats: FramingStats::default(),
        }
    }

    /// Current stage.
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Counters since creation.
    pub fn stats(&self) -> FramingStats {
        self.stats
    }

    /// Current configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Bytes of the telegram in progress.
    pub fn pending(&self) -> usize {
        self.telegram.buf.len()
    }

    /// How many bytes the current stage needs before it can decide anything.
    ///
    /// Never zero.
    pub fn wanted(&self) -> usize {
        match self.state {
            FramerState::BinaryHeader => HEADER_SIZE - self.telegram.buf.len(),
            FramerState::BinaryBody { len } => len - self.telegram.buf.len(),
            _ => 1,
        }
    }

    /// Feed up to [`wanted`](Framer::wanted) bytes.
    ///
    /// Returns how many bytes were consumed and the telegram completed by
    /// them, if any. `now` is recorded as the capture time when a telegram
    /// starts.
    pub fn push(&mut self, bytes: &[u8], now: SystemTime) -> (usize, Option<Telegram>) {
        let Some(&first) = bytes.first() else {
            return (0, None);
        };

        match self.state {
            FramerState::Sync0 => (1, self.on_sync0(first, now)),
            FramerState::Sync1 => (1, self.on_sync1(first, now)),
            FramerState::Sync2 => (1, self.on_sync2(first, now)),
            FramerState::TextAccumulate => (1, self.on_text_byte(first, now)),
            FramerState::BinaryHeader | FramerState::BinaryBody { .. } => {
                let take = self.wanted().min(bytes.len());
                self.telegram.buf.extend_from_slice(&bytes[..take]);
                if self.wanted() > 0 {
                    return (take, None);
                }
                let telegram = match self.state {
                    FramerState::BinaryHeader => self.on_binary_header(),
                    _ => self.on_binary_body(),
                };
                (take, telegram)
            }
        }
    }

    /// Feed an arbitrary buffer and collect every telegram it completes.
    pub fn feed(&mut self, mut bytes: &[u8], now: SystemTime) -> Vec<Telegram> {
        let mut out = Vec::new();
        while !bytes.is_empty() {
            let (used, telegram) = self.push(bytes, now);
            out.extend(telegram);
            bytes = &bytes[used..];
        }
        out
    }

    /// Drop the telegram in progress because the stream failed mid-read.
    pub fn abort(&mut self, read: usize) {
        if self.state == FramerState::Sync0 && read == 0 {
            return;
        }
        let wanted = self.wanted();
        self.fault(FramingFault::ShortRead { read, wanted });
    }

    fn on_sync0(&mut self, byte: u8, now: SystemTime) -> Option<Telegram> {
        if byte == SYNC_BYTE_1 {
            self.telegram = Assembly::starting_at_sync(now);
            self.state = FramerState::Sync1;
        } else {
            self.telegram = Assembly::new(now);
            self.telegram.buf.reserve(TEXT_CAPACITY_HINT);
            self.telegram.buf.extend_from_slice(&[byte]);
            self.state = FramerState::TextAccumulate;
        }
        None
    }

    fn on_sync1(&mut self, byte: u8, now: SystemTime) -> Option<Telegram> {
        if byte == SYNC_BYTE_1 {
            // The receiver may repeat `$` before the real selector.
            self.telegram = Assembly::starting_at_sync(now);
            return None;
        }
        match sync::classify_second(byte) {
            Some(format) => {
                self.telegram.buf.extend_from_slice(&[byte]);
                self.telegram.format = format;
                self.state = match format {
                    TelegramFormat::Binary => FramerState::BinaryHeader,
                    _ => FramerState::Sync2,
                };
            }
            None => self.fault(FramingFault::UnknownFormat { byte }),
        }
        None
    }

    fn on_sync2(&mut self, byte: u8, now: SystemTime) -> Option<Telegram> {
        if byte == SYNC_BYTE_1 {
            self.telegram = Assembly::starting_at_sync(now);
            self.state = FramerState::Sync1;
            return None;
        }
        match sync::confirm_third(self.telegram.format, byte) {
            Some(format) => {
                self.telegram.buf.reserve(TEXT_CAPACITY_HINT);
                self.telegram.buf.extend_from_slice(&[byte]);
                self.telegram.format = format;
                self.state = FramerState::TextAccumulate;
            }
            None => self.fault(FramingFault::UnconfirmedFormat { byte }),
        }
        None
    }

    fn on_text_byte(&mut self, byte: u8, now: SystemTime) -> Option<Telegram> {
        self.telegram.buf.extend_from_slice(&[byte]);

        match byte {
            SYNC_BYTE_1 => {
                let discarded = self.telegram.buf.len() - 1;
                debug!(fault = %FramingFault::SyncInsideLine { discarded }, "resynchronizing");
                self.stats.resyncs += 1;
                self.telegram = Assembly::starting_at_sync(now);
                self.state = FramerState::Sync1;
                None
            }
            LF => {
                let len = self.telegram.buf.len();
                if len >= 2 && self.telegram.buf[len - 2] == CR {
                    self.deliver()
                } else {
                    debug!(
                        line = %String::from_utf8_lossy(&self.telegram.buf),
                        "LF without CR"
                    );
                    self.fault(FramingFault::LineWithoutCr { len });
                    None
                }
            }
            CONNECTION_DESCRIPTOR_FOOTER if self.telegram.format == TelegramFormat::Unknown => {
                self.telegram.format = TelegramFormat::ConnectionDescriptor;
                self.deliver()
            }
            _ => None,
        }
    }

    fn on_binary_header(&mut self) -> Option<Telegram> {
        let len = integrity::block_length(&self.telegram.buf).map_or(0, usize::from);
        if len > self.config.max_block_len {
            self.fault(FramingFault::BlockTooLarge {
                len,
                max: self.config.max_block_len,
            });
            return None;
        }
        if len < HEADER_SIZE {
            self.fault(FramingFault::BlockTooShort { len });
            return None;
        }
        if len == HEADER_SIZE {
            return self.on_binary_body();
        }

        self.telegram.buf.reserve(len - HEADER_SIZE);
        self.state = FramerState::BinaryBody { len };
        None
    }

    fn on_binary_body(&mut self) -> Option<Telegram> {
        if integrity::is_valid(&self.telegram.buf) {
            return self.deliver();
        }
        let block_id = integrity::block_id(&self.telegram.buf).unwrap_or_default();
        self.stats.crc_failures += 1;
        self.fault(FramingFault::ChecksumMismatch { block_id });
        None
    }

    fn deliver(&mut self) -> Option<Telegram> {
        let assembly = std::mem::replace(&mut self.telegram, Assembly::new(SystemTime::now()));
        self.state = FramerState::Sync0;
        self.stats.delivered += 1;
        let telegram = assembly.finish();
        trace!(format = %telegram.format, len = telegram.len(), "telegram framed");
        Some(telegram)
    }

    fn fault(&mut self, fault: FramingFault) {
        debug!(%fault, "resynchronizing");
        self.stats.resyncs += 1;
        self.resync();
    }

    fn resync(&mut self) {
        self.telegram = Assembly::new(SystemTime::now());
        self.state = FramerState::Sync0;
    }
}
