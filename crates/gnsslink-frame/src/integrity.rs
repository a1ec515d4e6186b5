//! Binary block integrity checks.
//!
//! Block layout:
//! ```text
//! ┌────────┬────────┬───────────┬─────────────────┬──────────────┬──────────────┐
//! │ $ (1B) │ @ (1B) │ CRC (2B)  │ ID (2B LE)      │ Length (2B)  │ Body         │
//! │  0x24  │  0x40  │ LE        │ rev:3 | num:13  │ LE, total    │              │
//! └────────┴────────┴───────────┴─────────────────┴──────────────┴──────────────┘
//! ```
//! The CRC is CRC-16-CCITT (XModem) over everything after the CRC field, up to
//! the declared length. All functions here are pure.

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_XMODEM};

use crate::error::{FrameError, Result};
use crate::sync::{BINARY_SYNC_BYTE_2, SYNC_BYTE_1};

/// Binary header: sync (2) + CRC (2) + ID (2) + length (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

const CRC_OFFSET: usize = 2;
const ID_OFFSET: usize = 4;
const LENGTH_OFFSET: usize = 6;

/// Bits of the ID field holding the block number.
pub const BLOCK_NUMBER_MASK: u16 = 0x1FFF;

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Declared total block length (header included).
pub fn block_length(buf: &[u8]) -> Option<u16> {
    read_u16_le(buf, LENGTH_OFFSET)
}

/// Block number, with the revision bits masked off.
pub fn block_id(buf: &[u8]) -> Option<u16> {
    read_u16_le(buf, ID_OFFSET).map(|id| id & BLOCK_NUMBER_MASK)
}

/// Block revision (top three bits of the ID field).
pub fn block_revision(buf: &[u8]) -> Option<u8> {
    read_u16_le(buf, ID_OFFSET).map(|id| (id >> 13) as u8)
}

/// CRC stored in the header.
pub fn stored_crc(buf: &[u8]) -> Option<u16> {
    read_u16_le(buf, CRC_OFFSET)
}

/// CRC computed over the block contents up to the declared length.
///
/// Returns `None` when the buffer is shorter than its header or its declared length.
pub fn compute_crc(buf: &[u8]) -> Option<u16> {
    let length = usize::from(block_length(buf)?);
    if length < HEADER_SIZE {
        return None;
    }
    let covered = buf.get(ID_OFFSET..length)?;
    Some(XMODEM.checksum(covered))
}

/// Whether a complete binary block carries a matching checksum.
pub fn is_valid(buf: &[u8]) -> bool {
    match (stored_crc(buf), compute_crc(buf)) {
        (Some(stored), Some(computed)) => stored == computed,
        _ => false,
    }
}

/// Encode a binary block around `body`, filling in length and CRC.
///
/// Receivers pad bodies to a multiple of four bytes; this function writes the
/// body as given.
pub fn encode_block(block_number: u16, revision: u8, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let total = HEADER_SIZE + body.len();
    if total > usize::from(u16::MAX) {
        return Err(FrameError::BlockTooLarge {
            size: total,
            max: usize::from(u16::MAX),
        });
    }

    let id = (block_number & BLOCK_NUMBER_MASK) | (u16::from(revision & 0x07) << 13);
    let start = dst.len();
    dst.reserve(total);
    dst.put_u8(SYNC_BYTE_1);
    dst.put_u8(BINARY_SYNC_BYTE_2);
    dst.put_u16_le(0);
    dst.put_u16_le(id);
    dst.put_u16_le(total as u16);
    dst.put_slice(body);

    let crc = XMODEM.checksum(&dst[start + ID_OFFSET..start + total]);
    dst[start + CRC_OFFSET..start + ID_OFFSET].copy_from_slice(&crc.to_le_bytes());
    Ok(())
}
