//! Synchsafe integers: 28 significant bits spread over four 7-bit bytes.
//!
//! The top bit of every encoded byte is always clear, so an encoded size
//! can never look like an MPEG frame sync.

use crate::{Error, Result};

/// Largest value a synchsafe integer can hold.
pub const MAX: u32 = 0x0FFF_FFFF;

/// Encode the low 28 bits of `value`.
pub fn encode(value: u32) -> u32 {
    (value & 0x7f)
        | ((value & 0x3f80) << 1)
        | ((value & 0x1f_c000) << 2)
        | ((value & 0x0fe0_0000) << 3)
}

/// Decode a synchsafe integer. Top bits of each byte are ignored.
pub fn decode(encoded: u32) -> u32 {
    (encoded & 0x7f)
        | ((encoded & 0x7f00) >> 1)
        | ((encoded & 0x7f_0000) >> 2)
        | ((encoded & 0x7f00_0000) >> 3)
}

/// Encode `value`, rejecting anything above [`MAX`].
pub fn checked_encode(value: u32) -> Result<u32> {
    if value > MAX {
        return Err(Error::ValueOutOfRange {
            value: value as u64,
            max: MAX as u64,
        });
    }
    Ok(encode(value))
}

/// Encode to the 4-byte big-endian wire form.
pub fn encode_bytes(value: u32) -> Result<[u8; 4]> {
    Ok(checked_encode(value)?.to_be_bytes())
}

/// Decode the 4-byte big-endian wire form.
pub fn decode_bytes(bytes: [u8; 4]) -> u32 {
    decode(u32::from_be_bytes(bytes))
}

/// Whether every byte of `encoded` has its top bit clear.
pub fn is_synchsafe(encoded: u32) -> bool {
    encoded & 0x8080_8080 == 0
}
