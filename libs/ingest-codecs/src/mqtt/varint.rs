//! Remaining-length variable byte integer
//!
//! Seven data bits per byte, least significant group first, high bit set
//! while more bytes follow. At most four bytes.

use crate::error::{CodecError, Result};
use crate::transport::{read_part, Transport};

/// Largest value that fits in four bytes
pub const MAX_REMAINING_LENGTH: u32 = 268_435_455;

const MAX_VARINT_BYTES: usize = 4;

/// Encode a remaining length into 1-4 bytes
pub fn encode_remaining_length(value: u32) -> Result<Vec<u8>> {
    if value > MAX_REMAINING_LENGTH {
        return Err(CodecError::RemainingLengthTooLarge(value));
    }

    let mut encoded = Vec::with_capacity(MAX_VARINT_BYTES);
    let mut n = value;
    loop {
        let mut byte = (n % 128) as u8;
        n /= 128;
        if n > 0 {
            byte |= 0x80;
        }
        encoded.push(byte);
        if n == 0 {
            break;
        }
    }
    Ok(encoded)
}

/// Decode from the start of a slice, returning `(value, bytes_consumed)`
pub fn decode_remaining_length_slice(data: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    let mut multiplier: u32 = 1;

    for (i, &byte) in data.iter().take(MAX_VARINT_BYTES).enumerate() {
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }

    if data.len() >= MAX_VARINT_BYTES {
        Err(CodecError::MalformedVarint)
    } else {
        Err(CodecError::IncompleteFrame {
            needed: data.len() + 1,
            received: data.len(),
        })
    }
}

/// Decode by reading one byte at a time from a transport
pub async fn decode_remaining_length<T>(transport: &mut T) -> Result<u32>
where
    T: Transport + ?Sized,
{
    read_remaining_length(transport, 0).await.map(|(value, _)| value)
}

/// Transport decode used inside a packet; `frame_so_far` counts bytes already read
pub(crate) async fn read_remaining_length<T>(transport: &mut T, frame_so_far: usize) -> Result<(u32, usize)>
where
    T: Transport + ?Sized,
{
    let mut value: u32 = 0;
    let mut multiplier: u32 = 1;

    for i in 0..MAX_VARINT_BYTES {
        let byte = read_part(transport, 1, frame_so_far + i).await?[0];
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }

    Err(CodecError::MalformedVarint)
}
