//! Record identifiers: four-character codes and GUIDs.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::{Convention, Error, Result};

/// Four-character type code (ISO-BMFF box type, RIFF chunk tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    /// Create from bytes.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for FourCc {
    type Err = Error;

    /// Parse 1 to 4 ASCII characters; short codes are padded with spaces.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 4 || !s.is_ascii() {
            return Err(Error::InvalidIdentifier(format!(
                "expected 1-4 ASCII characters, got {s:?}"
            )));
        }
        let mut bytes = [b' '; 4];
        bytes[..s.len()].copy_from_slice(s.as_bytes());
        Ok(Self(bytes))
    }
}

/// 16-byte globally unique identifier, kept in wire byte order.
///
/// ASF stores GUIDs in the mixed-endian Microsoft layout; ISO-BMFF `uuid`
/// boxes store them as plain big-endian bytes. The bytes are never reordered
/// once read, so both round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// Create from wire bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Wire bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parse the registry form `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` of a
    /// Microsoft GUID, converting the first three groups to little-endian as
    /// ASF stores them.
    pub fn from_ms_str(s: &str) -> Result<Self> {
        parse_uuid(s).map(|uuid| Self(uuid.to_bytes_le()))
    }

    /// Format in the Microsoft registry form (inverse of [`Guid::from_ms_str`]).
    pub fn to_ms_string(&self) -> String {
        format!("{:X}", Uuid::from_bytes_le(self.0).hyphenated())
    }
}

impl fmt::Display for Guid {
    /// Wire byte order, grouped 8-4-4-4-12.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Uuid::from_bytes(self.0).hyphenated(), f)
    }
}

impl FromStr for Guid {
    type Err = Error;

    /// Parse wire byte order (the [`Display`](fmt::Display) form).
    fn from_str(s: &str) -> Result<Self> {
        parse_uuid(s).map(|uuid| Self(uuid.into_bytes()))
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::InvalidIdentifier(format!("malformed GUID {s:?}: {e}")))
}

/// Type identifier of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    /// Four-character code.
    FourCc(FourCc),
    /// 16-byte GUID (ASF object, ISO-BMFF `uuid` extended type).
    Guid(Guid),
}

impl Identifier {
    /// Construct a four-character identifier.
    pub const fn fourcc(bytes: &[u8; 4]) -> Self {
        Self::FourCc(FourCc(*bytes))
    }

    /// Encoded length of the identifier in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::FourCc(_) => 4,
            Self::Guid(_) => 16,
        }
    }

    /// Identifiers are never empty; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The four-character code, if this is one.
    pub fn as_fourcc(&self) -> Option<FourCc> {
        match self {
            Self::FourCc(code) => Some(*code),
            Self::Guid(_) => None,
        }
    }

    /// The GUID, if this is one.
    pub fn as_guid(&self) -> Option<Guid> {
        match self {
            Self::Guid(guid) => Some(*guid),
            Self::FourCc(_) => None,
        }
    }

    /// Normalized lookup key under `convention`.
    ///
    /// ISO-BMFF and RIFF codes are case-folded; RIFF codes also lose trailing
    /// spaces. GUIDs match exactly.
    pub fn key(&self, convention: Convention) -> String {
        match self {
            Self::Guid(guid) => guid.to_string(),
            Self::FourCc(code) => {
                let text: String = code.0.iter().map(|&b| b as char).collect();
                match convention {
                    Convention::IsoBmff => text.to_ascii_lowercase(),
                    Convention::Riff => text.trim_end_matches(' ').to_ascii_lowercase(),
                    Convention::Asf => text,
                }
            }
        }
    }

    /// Whether two identifiers resolve to the same key under `convention`.
    pub fn matches(&self, other: &Identifier, convention: Convention) -> bool {
        self == other || self.key(convention) == other.key(convention)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FourCc(code) => fmt::Display::fmt(code, f),
            Self::Guid(guid) => fmt::Display::fmt(guid, f),
        }
    }
}

impl FromStr for Identifier {
    type Err = Error;

    /// Up to four characters parse as a [`FourCc`]; anything else must be a
    /// GUID in wire byte order.
    fn from_str(s: &str) -> Result<Self> {
        if s.len() <= 4 {
            s.parse().map(Self::FourCc)
        } else {
            s.parse().map(Self::Guid)
        }
    }
}

impl From<FourCc> for Identifier {
    fn from(code: FourCc) -> Self {
        Self::FourCc(code)
    }
}

impl From<[u8; 4]> for Identifier {
    fn from(bytes: [u8; 4]) -> Self {
        Self::FourCc(FourCc(bytes))
    }
}

impl From<Guid> for Identifier {
    fn from(guid: Guid) -> Self {
        Self::Guid(guid)
    }
}
