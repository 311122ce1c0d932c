//! Inclusive bit-range extraction and replacement.
//!
//! Bit 0 is the least significant bit. A range `start..=end` covers
//! `end - start + 1` contiguous bits.

use crate::{Error, Result};

/// Number of bits in the integers handled here.
pub const WIDTH: u32 = u64::BITS;

/// Mask with every bit from `start` to `end` (inclusive) set.
///
/// ```
/// use mediabox_bits::bits::bit_mask;
///
/// assert_eq!(bit_mask(0, 0).unwrap(), 0b1);
/// assert_eq!(bit_mask(2, 4).unwrap(), 0b1_1100);
/// assert_eq!(bit_mask(0, 63).unwrap(), u64::MAX);
/// ```
pub fn bit_mask(start: u32, end: u32) -> Result<u64> {
    if start > end || end >= WIDTH {
        return Err(Error::InvalidBitRange { start, end });
    }
    let width = end - start + 1;
    let ones = if width == WIDTH {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    Ok(ones << start)
}

/// Extract bits `start..=end` of `value`, shifted down to bit 0.
pub fn checked_get_bits(value: u64, start: u32, end: u32) -> Result<u64> {
    let mask = bit_mask(start, end)?;
    Ok((value & mask) >> start)
}

/// Replace bits `start..=end` of `value` with the low bits of `new_value`.
///
/// Bits of `new_value` that do not fit the range are discarded.
pub fn checked_set_bits(value: u64, start: u32, end: u32, new_value: u64) -> Result<u64> {
    let mask = bit_mask(start, end)?;
    Ok((value & !mask) | ((new_value << start) & mask))
}

/// Extract bits `start..=end` of `value`.
///
/// # Panics
///
/// Panics if `start > end` or `end >= 64`.
pub fn get_bits(value: u64, start: u32, end: u32) -> u64 {
    match checked_get_bits(value, start, end) {
        Ok(bits) => bits,
        Err(e) => panic!("{e}"),
    }
}

/// Replace bits `start..=end` of `value` with `new_value`.
///
/// # Panics
///
/// Panics if `start > end` or `end >= 64`.
pub fn set_bits(value: u64, start: u32, end: u32, new_value: u64) -> u64 {
    match checked_set_bits(value, start, end, new_value) {
        Ok(bits) => bits,
        Err(e) => panic!("{e}"),
    }
}

/// Test a single bit.
pub fn is_set(value: u64, bit: u32) -> bool {
    bit < WIDTH && value & (1 << bit) != 0
}
