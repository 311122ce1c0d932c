//! The three record header conventions.

use std::fmt;

/// Header layout family of a container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Convention {
    /// ISO base media file format (MP4, MOV, 3GP, HEIF): big-endian size,
    /// four-character type, 64-bit and `uuid` extensions.
    IsoBmff,
    /// Advanced Systems Format (WMA, WMV): GUID plus little-endian 64-bit size.
    Asf,
    /// Resource Interchange File Format (WAV, AVI, WebP): tag plus
    /// little-endian 32-bit content size, padded to even length.
    Riff,
}

impl Convention {
    /// Smallest possible header.
    pub fn min_header_len(self) -> u64 {
        match self {
            Self::IsoBmff | Self::Riff => 8,
            Self::Asf => 24,
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IsoBmff => write!(f, "ISO-BMFF"),
            Self::Asf => write!(f, "ASF"),
            Self::Riff => write!(f, "RIFF"),
        }
    }
}
