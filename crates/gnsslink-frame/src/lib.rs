//! Telegram framing for GNSS/INS receiver byte streams.
//!
//! This is the core value-add layer of gnsslink. A receiver interleaves several
//! wire formats on one link, all starting with the same sync byte `$`:
//! - Binary blocks (`$@`): 8-byte header with CRC, ID and little-endian length
//! - NMEA sentences (`$GP`, `$IN`) terminated by CR LF
//! - Command replies (`$R:`, `$R!`) and error replies (`$R?`)
//! - Connection descriptors (`IP10>`), terminated by `>`
//!
//! The [`Framer`] is a byte-synchronous state machine that never asks for more
//! bytes than the next decision needs, recovers from any malformed input by
//! resynchronizing, and only ever emits complete, validated [`Telegram`]s.

#[cfg(feature = "async")]
pub mod async_reader;
pub mod error;
pub mod framer;
pub mod integrity;
pub mod queue;
pub mod reader;
pub mod sync;
pub mod telegram;

#[cfg(feature = "async")]
pub use async_reader::AsyncTelegramReader;
pub use error::{FrameError, FramingFault, Result};
pub use framer::{Framer, FramerConfig, FramerState, FramingStats, DEFAULT_MAX_BLOCK_LEN};
pub use integrity::{block_id, block_length, encode_block, is_valid, HEADER_SIZE};
pub use queue::TelegramSink;
pub use reader::TelegramReader;
pub use telegram::{Telegram, TelegramFormat};
