//! Record header codec for the three conventions.
//!
//! | Convention | Layout | Size covers |
//! |---|---|---|
//! | ISO-BMFF | `size:u32be type:4cc [largesize:u64be] [usertype:16]` | header + content |
//! | ASF | `guid:16 size:u64le` | header + content |
//! | RIFF | `tag:4cc size:u32le` + pad byte if size is odd | content only |

use std::io::{self, Read};

use bytes::{Buf, BufMut, BytesMut};

use crate::{Convention, Error, FourCc, Guid, Identifier, Result};

/// ISO-BMFF type marking an extended 16-byte identifier.
pub const UUID: FourCc = FourCc(*b"uuid");

/// Size field value meaning "a 64-bit size follows" (ISO-BMFF).
const LARGE_SIZE_MARKER: u32 = 1;

/// Size field value meaning "extends to the end of the enclosing stream".
const OPEN_ENDED_MARKER: u32 = 0;

/// Byte layout of one record: header, content, and trailing pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Header length in bytes (8, 16, 24, 32 or 40 depending on shape).
    pub header_len: u64,
    /// Bytes between the header and the pad byte.
    pub content_len: u64,
    /// RIFF pad byte (0 or 1).
    pub pad: u64,
    /// ISO-BMFF 64-bit size field in use.
    pub large_size: bool,
}

impl Extent {
    /// Lay out a record of `content_len` bytes.
    ///
    /// `prefer_large` keeps an ISO-BMFF 64-bit size field even when the
    /// record would fit 32 bits, so records read in that shape are written
    /// back unchanged.
    pub fn for_content(
        convention: Convention,
        identifier: &Identifier,
        content_len: u64,
        prefer_large: bool,
    ) -> Result<Self> {
        validate_identifier(convention, identifier)?;
        match convention {
            Convention::IsoBmff => {
                let base = iso_base_header_len(identifier);
                let large = prefer_large
                    || base
                        .checked_add(content_len)
                        .map_or(true, |total| total > u32::MAX as u64);
                Ok(Self {
                    header_len: if large { base + 8 } else { base },
                    content_len,
                    pad: 0,
                    large_size: large,
                })
            }
            Convention::Asf => Ok(Self {
                header_len: 24,
                content_len,
                pad: 0,
                large_size: true,
            }),
            Convention::Riff => {
                if content_len > u32::MAX as u64 {
                    return Err(Error::SizeOverflow {
                        convention,
                        size: content_len,
                        max: u32::MAX as u64,
                    });
                }
                Ok(Self {
                    header_len: 8,
                    content_len,
                    pad: content_len & 1,
                    large_size: false,
                })
            }
        }
    }

    /// Total bytes the record occupies.
    pub fn size(&self) -> u64 {
        self.header_len + self.content_len + self.pad
    }

    /// Offset of the content relative to the header start.
    pub fn content_start(&self) -> u64 {
        self.header_len
    }
}

/// Decoded header of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record type.
    pub identifier: Identifier,
    /// Layout derived from the size field.
    pub extent: Extent,
    /// ISO-BMFF size 0: the record runs to the end of its enclosing range.
    pub open_ended: bool,
}

impl RecordHeader {
    /// Header for a record carrying `payload_len` bytes, promoting to a
    /// 64-bit size only when needed.
    pub fn for_payload(
        convention: Convention,
        identifier: Identifier,
        payload_len: u64,
    ) -> Result<Self> {
        let extent = Extent::for_content(convention, &identifier, payload_len, false)?;
        Ok(Self {
            identifier,
            extent,
            open_ended: false,
        })
    }

    /// Header for a record whose total size (header included) is known.
    pub fn with_declared_size(
        convention: Convention,
        identifier: Identifier,
        declared_size: u64,
    ) -> Result<Self> {
        validate_identifier(convention, &identifier)?;
        let extent = match convention {
            Convention::IsoBmff => {
                let base = iso_base_header_len(&identifier);
                if declared_size < base {
                    return Err(Error::HeaderTooSmall {
                        size: declared_size,
                        min: base,
                    });
                }
                let large = declared_size > u32::MAX as u64;
                let header_len = if large { base + 8 } else { base };
                Extent {
                    header_len,
                    content_len: declared_size - header_len,
                    pad: 0,
                    large_size: large,
                }
            }
            Convention::Asf => {
                if declared_size < 24 {
                    return Err(Error::HeaderTooSmall {
                        size: declared_size,
                        min: 24,
                    });
                }
                Extent {
                    header_len: 24,
                    content_len: declared_size - 24,
                    pad: 0,
                    large_size: true,
                }
            }
            Convention::Riff => {
                if declared_size < 8 {
                    return Err(Error::HeaderTooSmall {
                        size: declared_size,
                        min: 8,
                    });
                }
                if declared_size % 2 != 0 {
                    return Err(Error::malformed(
                        0,
                        format!("RIFF record size {declared_size} cannot be odd once padded"),
                    ));
                }
                Extent::for_content(convention, &identifier, declared_size - 8, false)?
            }
        };
        Ok(Self {
            identifier,
            extent,
            open_ended: false,
        })
    }

    /// Total declared size, header included.
    pub fn size(&self) -> u64 {
        self.extent.size()
    }

    /// Header length in bytes.
    pub fn header_len(&self) -> u64 {
        self.extent.header_len
    }

    /// Append the header bytes (not the pad byte) to `buf`.
    pub fn encode(&self, convention: Convention, buf: &mut BytesMut) -> Result<()> {
        encode_extent(convention, &self.identifier, &self.extent, buf)
    }
}

/// Encode the header for `identifier` carrying `payload_len` bytes.
pub fn encode_header(
    convention: Convention,
    identifier: Identifier,
    payload_len: u64,
) -> Result<BytesMut> {
    let header = RecordHeader::for_payload(convention, identifier, payload_len)?;
    let mut buf = BytesMut::with_capacity(header.header_len() as usize);
    header.encode(convention, &mut buf)?;
    Ok(buf)
}

/// Append header bytes for `identifier` laid out as `extent`.
pub(crate) fn encode_extent(
    convention: Convention,
    identifier: &Identifier,
    extent: &Extent,
    buf: &mut BytesMut,
) -> Result<()> {
    match (convention, identifier) {
        (Convention::IsoBmff, _) => {
            let size = extent.size();
            if extent.large_size {
                buf.put_u32(LARGE_SIZE_MARKER);
            } else {
                buf.put_u32(size as u32);
            }
            match identifier {
                Identifier::FourCc(code) => buf.put_slice(&code.0),
                Identifier::Guid(_) => buf.put_slice(&UUID.0),
            }
            if extent.large_size {
                buf.put_u64(size);
            }
            if let Identifier::Guid(guid) = identifier {
                buf.put_slice(&guid.0);
            }
        }
        (Convention::Asf, Identifier::Guid(guid)) => {
            buf.put_slice(&guid.0);
            buf.put_u64_le(extent.size());
        }
        (Convention::Riff, Identifier::FourCc(code)) => {
            buf.put_slice(&code.0);
            buf.put_u32_le(extent.content_len as u32);
        }
        (Convention::Asf, Identifier::FourCc(_)) | (Convention::Riff, Identifier::Guid(_)) => {
            return Err(Error::UnsupportedIdentifier {
                convention,
                identifier: *identifier,
            });
        }
    }
    Ok(())
}

/// Decode one header from `reader`, positioned at the header start.
///
/// `offset` is the absolute header position (for error reporting) and
/// `available` the number of bytes from there to the end of the enclosing
/// range. The declared size is not checked against `available`; the caller
/// decides whether an overrun is a containment or a truncation error.
pub fn decode_header<R: Read + ?Sized>(
    reader: &mut R,
    convention: Convention,
    offset: u64,
    available: u64,
    allow_open_ended: bool,
) -> Result<RecordHeader> {
    let min = convention.min_header_len();
    if available < min {
        return Err(Error::TruncatedStream {
            offset,
            need: min,
            have: available,
        });
    }

    match convention {
        Convention::IsoBmff => {
            let mut fixed = [0u8; 8];
            read_header_bytes(reader, &mut fixed, offset, available)?;
            let mut buf = &fixed[..];
            let size = buf.get_u32();
            let code = FourCc([fixed[4], fixed[5], fixed[6], fixed[7]]);

            let mut header_len = 8u64;
            let mut large_size = false;
            let mut declared = size as u64;
            if size == LARGE_SIZE_MARKER {
                let mut ext = [0u8; 8];
                read_header_bytes(reader, &mut ext, offset + header_len, available - header_len)?;
                declared = u64::from_be_bytes(ext);
                header_len += 8;
                large_size = true;
            }

            let identifier = if code == UUID {
                let mut guid = [0u8; 16];
                read_header_bytes(
                    reader,
                    &mut guid,
                    offset + header_len,
                    available.saturating_sub(header_len),
                )?;
                header_len += 16;
                Identifier::Guid(Guid(guid))
            } else {
                Identifier::FourCc(code)
            };

            let open_ended = !large_size && size == OPEN_ENDED_MARKER;
            if open_ended {
                if !allow_open_ended {
                    return Err(Error::malformed(
                        offset,
                        format!("{identifier} uses size 0 below the top level"),
                    ));
                }
                declared = available;
            }

            if declared < header_len {
                return Err(Error::malformed(
                    offset,
                    format!("{identifier} declares {declared} bytes but its header needs {header_len}"),
                ));
            }

            Ok(RecordHeader {
                identifier,
                extent: Extent {
                    header_len,
                    content_len: declared - header_len,
                    pad: 0,
                    large_size,
                },
                open_ended,
            })
        }
        Convention::Asf => {
            let mut fixed = [0u8; 24];
            read_header_bytes(reader, &mut fixed, offset, available)?;
            let mut guid = [0u8; 16];
            guid.copy_from_slice(&fixed[..16]);
            let mut buf = &fixed[16..];
            let declared = buf.get_u64_le();
            let identifier = Identifier::Guid(Guid(guid));
            if declared < 24 {
                return Err(Error::malformed(
                    offset,
                    format!("{identifier} declares {declared} bytes, below the 24-byte header"),
                ));
            }
            Ok(RecordHeader {
                identifier,
                extent: Extent {
                    header_len: 24,
                    content_len: declared - 24,
                    pad: 0,
                    large_size: true,
                },
                open_ended: false,
            })
        }
        Convention::Riff => {
            let mut fixed = [0u8; 8];
            read_header_bytes(reader, &mut fixed, offset, available)?;
            let identifier = Identifier::FourCc(FourCc([fixed[0], fixed[1], fixed[2], fixed[3]]));
            let mut buf = &fixed[4..];
            let content_len = buf.get_u32_le() as u64;
            let mut pad = content_len & 1;
            if pad == 1 && 8 + content_len == available {
                tracing::warn!(
                    "RIFF chunk {} at offset {} is missing its pad byte",
                    identifier,
                    offset
                );
                pad = 0;
            }
            Ok(RecordHeader {
                identifier,
                extent: Extent {
                    header_len: 8,
                    content_len,
                    pad,
                    large_size: false,
                },
                open_ended: false,
            })
        }
    }
}

/// Check that `identifier` can be written under `convention`.
pub fn validate_identifier(convention: Convention, identifier: &Identifier) -> Result<()> {
    match (convention, identifier) {
        (Convention::IsoBmff, _)
        | (Convention::Asf, Identifier::Guid(_))
        | (Convention::Riff, Identifier::FourCc(_)) => Ok(()),
        (Convention::Riff, Identifier::Guid(_)) => Err(Error::IdentifierTooLong {
            convention,
            identifier: *identifier,
        }),
        (Convention::Asf, Identifier::FourCc(_)) => Err(Error::UnsupportedIdentifier {
            convention,
            identifier: *identifier,
        }),
    }
}

fn iso_base_header_len(identifier: &Identifier) -> u64 {
    match identifier {
        Identifier::FourCc(_) => 8,
        Identifier::Guid(_) => 24,
    }
}

fn read_header_bytes<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    offset: u64,
    available: u64,
) -> Result<()> {
    let need = buf.len() as u64;
    if available < need {
        return Err(Error::TruncatedStream {
            offset,
            need,
            have: available,
        });
    }
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedStream {
            offset,
            need,
            have: 0,
        },
        _ => Error::Io(e),
    })
}
