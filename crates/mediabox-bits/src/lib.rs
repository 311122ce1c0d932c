//! # mediabox-bits
//!
//! Bit-exact helper codecs used by record schemas nested inside media
//! containers.
//!
//! - [`bits`] - extract and replace inclusive bit ranges of an integer
//! - [`synchsafe`] - 28-in-32 bit synchsafe integers (ID3v2 sizes)
//! - [`unsync`] - ID3v2 unsynchronisation escaping
//!
//! Nothing in this crate knows about container trees; it is consumed
//! directly by leaf schemas such as ID3v2 frame headers.
//!
//! ## Example
//!
//! ```
//! use mediabox_bits::{bits, synchsafe, unsync};
//!
//! assert_eq!(bits::get_bits(0b1011_0000, 4, 7), 0b1011);
//! assert_eq!(synchsafe::decode(synchsafe::encode(0x0FFF_FFFF)), 0x0FFF_FFFF);
//!
//! let escaped = unsync::encode(&[0xFF, 0xE0]);
//! assert_eq!(escaped, vec![0xFF, 0x00, 0xE0]);
//! assert_eq!(unsync::decode(&escaped), vec![0xFF, 0xE0]);
//! ```

pub mod bits;
pub mod error;
pub mod synchsafe;
pub mod unsync;

pub use error::{Error, Result};
