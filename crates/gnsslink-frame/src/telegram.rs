use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;

use crate::integrity;

/// Wire format of a telegram, refined as sync bytes are recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelegramFormat {
    /// Not (yet) classified. Also the final format of unclassified text lines.
    Unknown,
    /// Binary block (`$@`).
    Binary,
    /// NMEA sentence (`$GP`).
    Text,
    /// NMEA sentence from the INS (`$IN`).
    TextInertial,
    /// Command reply (`$R:` or `$R!`).
    Response,
    /// Command error reply (`$R?`).
    ErrorResponse,
    /// Connection descriptor prompt, terminated by `>`.
    ConnectionDescriptor,
}

impl TelegramFormat {
    /// Whether telegrams of this format are CR LF terminated text.
    pub fn is_text(self) -> bool {
        !matches!(self, TelegramFormat::Binary)
    }

    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TelegramFormat::Unknown => "unknown",
            TelegramFormat::Binary => "binary",
            TelegramFormat::Text => "nmea",
            TelegramFormat::TextInertial => "nmea-ins",
            TelegramFormat::Response => "response",
            TelegramFormat::ErrorResponse => "error-response",
            TelegramFormat::ConnectionDescriptor => "connection-descriptor",
        }
    }
}

impl fmt::Display for TelegramFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// One complete, framed unit of receiver output.
///
/// `bytes` holds the telegram exactly as it appeared on the wire, including
/// sync bytes and, for text, the trailing CR LF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    /// The raw telegram.
    pub bytes: Bytes,
    /// Detected wire format.
    pub format: TelegramFormat,
    /// When the first sync byte of this telegram was read.
    pub captured_at: SystemTime,
}

impl Telegram {
    /// Create a telegram.
    pub fn new(format: TelegramFormat, bytes: impl Into<Bytes>, captured_at: SystemTime) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            captured_at,
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the telegram holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Block number of a binary telegram (revision bits masked off).
    pub fn block_id(&self) -> Option<u16> {
        match self.format {
            TelegramFormat::Binary => integrity::block_id(&self.bytes),
            _ => None,
        }
    }

    /// Block revision of a binary telegram.
    pub fn block_revision(&self) -> Option<u8> {
        match self.format {
            TelegramFormat::Binary => integrity::block_revision(&self.bytes),
            _ => None,
        }
    }

    /// Text content without the CR LF terminator, if this is a text telegram.
    pub fn text(&self) -> Option<String> {
        if !self.format.is_text() {
            return None;
        }
        let body = self
            .bytes
            .strip_suffix(b"\r\n")
            .unwrap_or(&self.bytes[..]);
        Some(String::from_utf8_lossy(body).into_owned())
    }
}
