//! Sync-byte taxonomy.
//!
//! Every telegram starts with [`SYNC_BYTE_1`]. The second byte selects a
//! format; for text formats a third byte confirms it (or, for replies,
//! reclassifies it as an error reply). The decisions are table-driven so a new
//! format is one more row.

use crate::telegram::TelegramFormat;

/// First byte of every telegram: `$`.
pub const SYNC_BYTE_1: u8 = 0x24;

/// Second byte of a binary block: `@`.
pub const BINARY_SYNC_BYTE_2: u8 = 0x40;
/// Second byte of an NMEA sentence: `G`.
pub const TEXT_SYNC_BYTE_2: u8 = 0x47;
/// Second byte of an INS NMEA sentence: `I`.
pub const TEXT_INERTIAL_SYNC_BYTE_2: u8 = 0x49;
/// Second byte of a command reply: `R`.
pub const RESPONSE_SYNC_BYTE_2: u8 = 0x52;

/// Third byte of an NMEA sentence: `P`.
pub const TEXT_SYNC_BYTE_3: u8 = 0x50;
/// Third byte of an INS NMEA sentence: `N`.
pub const TEXT_INERTIAL_SYNC_BYTE_3: u8 = 0x4E;
/// Third byte of a command reply: `:`.
pub const RESPONSE_SYNC_BYTE_3: u8 = 0x3A;
/// Alternate third byte of a command reply: `!`.
pub const RESPONSE_SYNC_BYTE_3A: u8 = 0x21;
/// Third byte of an error reply: `?`.
pub const ERROR_SYNC_BYTE_3: u8 = 0x3F;

/// Carriage return.
pub const CR: u8 = 0x0D;
/// Line feed.
pub const LF: u8 = 0x0A;
/// Terminator of a connection descriptor prompt: `>`.
pub const CONNECTION_DESCRIPTOR_FOOTER: u8 = 0x3E;

/// Second byte → format.
const SECOND_BYTE: [(u8, TelegramFormat); 4] = [
    (BINARY_SYNC_BYTE_2, TelegramFormat::Binary),
    (TEXT_SYNC_BYTE_2, TelegramFormat::Text),
    (TEXT_INERTIAL_SYNC_BYTE_2, TelegramFormat::TextInertial),
    (RESPONSE_SYNC_BYTE_2, TelegramFormat::Response),
];

/// (provisional format, third byte) → confirmed format.
const THIRD_BYTE: [(TelegramFormat, u8, TelegramFormat); 5] = [
    (TelegramFormat::Text, TEXT_SYNC_BYTE_3, TelegramFormat::Text),
    (
        TelegramFormat::TextInertial,
        TEXT_INERTIAL_SYNC_BYTE_3,
        TelegramFormat::TextInertial,
    ),
    (TelegramFormat::Response, RESPONSE_SYNC_BYTE_3, TelegramFormat::Response),
    (TelegramFormat::Response, RESPONSE_SYNC_BYTE_3A, TelegramFormat::Response),
    (TelegramFormat::Response, ERROR_SYNC_BYTE_3, TelegramFormat::ErrorResponse),
];

/// Classify the byte following `$`.
pub fn classify_second(byte: u8) -> Option<TelegramFormat> {
    SECOND_BYTE
        .iter()
        .find(|(value, _)| *value == byte)
        .map(|(_, format)| *format)
}

/// Confirm (or reclassify) a provisional text format from its third byte.
pub fn confirm_third(provisional: TelegramFormat, byte: u8) -> Option<TelegramFormat> {
    THIRD_BYTE
        .iter()
        .find(|(format, value, _)| *format == provisional && *value == byte)
        .map(|(_, _, confirmed)| *confirmed)
}
