/// Errors surfaced by telegram readers.
///
/// Malformed input is never an error: it is a [`FramingFault`] that the framer
/// logs and recovers from on its own.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading from the link.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link reached end-of-stream.
    #[error("connection closed ({pending} bytes of an incomplete telegram dropped)")]
    ConnectionClosed { pending: usize },

    /// A block to encode does not fit the 16-bit length field.
    #[error("block too large ({size} bytes, max {max})")]
    BlockTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A recoverable defect in the inbound byte stream.
///
/// Every fault causes the framer to discard the telegram in progress and start
/// over at the first sync byte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingFault {
    /// The second byte after `$` selects no known format.
    #[error("sync byte 2 read fault, received byte was {byte:#04x}")]
    UnknownFormat { byte: u8 },

    /// The third byte does not confirm the provisional text format.
    #[error("sync byte 3 read fault, received byte was {byte:#04x}")]
    UnconfirmedFormat { byte: u8 },

    /// The binary header declares a length above the configured maximum.
    #[error("binary header read fault, length of block exceeds {max}: {len}")]
    BlockTooLarge { len: usize, max: usize },

    /// The binary header declares a length shorter than the header itself.
    #[error("binary header read fault, length of block below header size: {len}")]
    BlockTooShort { len: usize },

    /// The block checksum does not match its contents.
    #[error("crc failed for binary block {block_id}")]
    ChecksumMismatch { block_id: u16 },

    /// A line ended in LF without a preceding CR.
    #[error("line feed without carriage return after {len} bytes")]
    LineWithoutCr { len: usize },

    /// A sync byte arrived in the middle of an unterminated line.
    #[error("string read fault, sync byte found after {discarded} bytes")]
    SyncInsideLine { discarded: usize },

    /// The stream ended or failed before the requested bytes arrived.
    #[error("read fault, wrong number of bytes read: {read} of {wanted}")]
    ShortRead { read: usize, wanted: usize },
}
