//! Binary frame codec for cross-manager messages
//!
//! Frame layout:
//!
//! ```text
//! | length: u32 BE | version: u8 | bincode(Message) | crc32: u32 BE |
//! ```
//!
//! `length` counts everything after itself. The checksum covers the version
//! byte and the body.

use tracing::{debug, trace};

use crate::errors::CodecError;
use crate::message::Message;
use crate::Result;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Current frame version
pub const FRAME_VERSION: u8 = 1;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the checksum trailer
pub const CHECKSUM_SIZE: usize = 4;

/// Largest accepted frame body
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ----------------------------------------------------------------------------
// Encoding
// ----------------------------------------------------------------------------

/// Encode a message into a self-delimiting frame
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let body = bincode::serialize(message)?;
    let inner_len = 1 + body.len() + CHECKSUM_SIZE;
    if inner_len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: inner_len,
            max: MAX_FRAME_SIZE,
        }
        .into());
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + inner_len);
    frame.extend_from_slice(&(inner_len as u32).to_be_bytes());
    frame.push(FRAME_VERSION);
    frame.extend_from_slice(&body);

    let checksum = crc32fast::hash(&frame[LENGTH_PREFIX_SIZE..]);
    frame.extend_from_slice(&checksum.to_be_bytes());
    Ok(frame)
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Decode exactly one frame occupying all of `bytes`
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let mut cursor = bytes;
    let message = decode_frame(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(crate::SwitchyardError::generic(format!(
            "{} trailing bytes after frame",
            cursor.len()
        )));
    }
    Ok(message)
}

/// Decode the first frame in `buf`, advancing it past the frame on success
///
/// On any failure `buf` is left untouched.
pub fn decode_frame(buf: &mut &[u8]) -> Result<Message> {
    let bytes: &[u8] = buf;
    match parse_frame(bytes) {
        Ok((message, total)) => {
            trace!(bytes = total, src = %message.src, dst = %message.dst, "frame decoded");
            *buf = &bytes[total..];
            Ok(message)
        }
        Err(err) => {
            debug!(available = bytes.len(), "frame rejected: {}", err);
            Err(err)
        }
    }
}

/// Validate and decode one frame; returns the message and the frame length
fn parse_frame(bytes: &[u8]) -> Result<(Message, usize)> {

    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(CodecError::Truncated {
            expected: LENGTH_PREFIX_SIZE,
            actual: bytes.len(),
        }
        .into());
    }

    let inner_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if inner_len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: inner_len,
            max: MAX_FRAME_SIZE,
        }
        .into());
    }
    if inner_len < 1 + CHECKSUM_SIZE {
        return Err(CodecError::Truncated {
            expected: LENGTH_PREFIX_SIZE + 1 + CHECKSUM_SIZE,
            actual: LENGTH_PREFIX_SIZE + inner_len,
        }
        .into());
    }

    let total = LENGTH_PREFIX_SIZE + inner_len;
    if bytes.len() < total {
        return Err(CodecError::Truncated {
            expected: total,
            actual: bytes.len(),
        }
        .into());
    }

    let checked = &bytes[LENGTH_PREFIX_SIZE..total - CHECKSUM_SIZE];
    let trailer = &bytes[total - CHECKSUM_SIZE..total];
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32fast::hash(checked);
    if expected != actual {
        return Err(CodecError::ChecksumMismatch { expected, actual }.into());
    }

    let version = checked[0];
    if version != FRAME_VERSION {
        return Err(CodecError::UnsupportedVersion { version }.into());
    }

    let message: Message = bincode::deserialize(&checked[1..])?;
    if !message.is_valid() {
        return Err(CodecError::InvalidMessage {
            src: message.src,
            dst: message.dst,
        }
        .into());
    }
    if !message.has_finite_due() {
        return Err(CodecError::InvalidDueTime { due: message.due }.into());
    }

    Ok((message, total))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
