//! ASF Header Object and Header Extension Object.
//!
//! GUIDs are stored in wire byte order (the first three fields little-endian).

use std::any::Any;
use std::io::{self, Write};

use bytes::{BufMut, BytesMut};

use crate::payload::{Body, Payload, WriteContext};
use crate::registry::RecordSchema;
use crate::source::RecordReader;
use crate::{Guid, ReadContext, Registry, Result};

/// 75B22630-668E-11CF-A6D9-00AA0062CE6C
pub const HEADER_OBJECT: Guid = Guid([
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
]);
/// 75B22636-668E-11CF-A6D9-00AA0062CE6C
pub const DATA_OBJECT: Guid = Guid([
    0x36, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
]);
/// 33000890-E5B1-11CF-89F4-00A0C90349CB
pub const SIMPLE_INDEX_OBJECT: Guid = Guid([
    0x90, 0x08, 0x00, 0x33, 0xB1, 0xE5, 0xCF, 0x11, 0x89, 0xF4, 0x00, 0xA0, 0xC9, 0x03, 0x49, 0xCB,
]);
/// 8CABDCA1-A947-11CF-8EE4-00C00C205365
pub const FILE_PROPERTIES_OBJECT: Guid = Guid([
    0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
]);
/// B7DC0791-A9B7-11CF-8EE6-00C00C205365
pub const STREAM_PROPERTIES_OBJECT: Guid = Guid([
    0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
]);
/// 75B22633-668E-11CF-A6D9-00AA0062CE6C
pub const CONTENT_DESCRIPTION_OBJECT: Guid = Guid([
    0x33, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
]);
/// D2D0A440-E307-11D2-97F0-00A0C95EA850
pub const EXTENDED_CONTENT_DESCRIPTION_OBJECT: Guid = Guid([
    0x40, 0xA4, 0xD0, 0xD2, 0x07, 0xE3, 0xD2, 0x11, 0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50,
]);
/// 5FBF03B5-A92E-11CF-8EE3-00C00C205365
pub const HEADER_EXTENSION_OBJECT: Guid = Guid([
    0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
]);
/// ABD3D211-A9BA-11CF-8EE6-00C00C205365, the fixed Reserved Field 1 of the
/// Header Extension Object.
pub const HEADER_EXTENSION_RESERVED: Guid = Guid([
    0x11, 0xD2, 0xD3, 0xAB, 0xBA, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
]);

/// Add the ASF built-ins to `registry`.
pub fn register(registry: &mut Registry) {
    registry.register(HEADER_OBJECT, HeaderObjectSchema);
    registry.register(HEADER_EXTENSION_OBJECT, HeaderExtensionSchema);
}

/// Fields between the Header Object's header and its first child.
///
/// The object count is rewritten from the actual children on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderObjectPrefix {
    /// Count as read from the file.
    pub object_count: u32,
    pub reserved1: u8,
    pub reserved2: u8,
}

impl Default for HeaderObjectPrefix {
    fn default() -> Self {
        Self {
            object_count: 0,
            reserved1: 0x01,
            reserved2: 0x02,
        }
    }
}

impl Payload for HeaderObjectPrefix {
    fn encoded_len(&self) -> u64 {
        6
    }

    fn write_to(&self, out: &mut dyn Write, ctx: &WriteContext) -> io::Result<()> {
        let count = u32::try_from(ctx.child_count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "too many header objects"))?;
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u32_le(count);
        buf.put_u8(self.reserved1);
        buf.put_u8(self.reserved2);
        out.write_all(&buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderObjectSchema;

impl RecordSchema for HeaderObjectSchema {
    fn name(&self) -> &str {
        "asf-header"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn read(&self, input: &mut RecordReader<'_>, _ctx: &ReadContext<'_>) -> Result<Body> {
        Ok(Body::decoded(HeaderObjectPrefix {
            object_count: input.read_u32_le()?,
            reserved1: input.read_u8()?,
            reserved2: input.read_u8()?,
        }))
    }
}

/// Fields before the Header Extension Object's nested objects.
///
/// The data size is rewritten from the bytes that follow on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderExtensionPrefix {
    pub reserved1: Guid,
    pub reserved2: u16,
    /// Data size as read from the file.
    pub data_size: u32,
}

impl Default for HeaderExtensionPrefix {
    fn default() -> Self {
        Self {
            reserved1: HEADER_EXTENSION_RESERVED,
            reserved2: 6,
            data_size: 0,
        }
    }
}

impl Payload for HeaderExtensionPrefix {
    fn encoded_len(&self) -> u64 {
        22
    }

    fn write_to(&self, out: &mut dyn Write, ctx: &WriteContext) -> io::Result<()> {
        let data_size = u32::try_from(ctx.children_len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "header extension data exceeds 4 GiB")
        })?;
        let mut buf = BytesMut::with_capacity(22);
        buf.put_slice(&self.reserved1.0);
        buf.put_u16_le(self.reserved2);
        buf.put_u32_le(data_size);
        out.write_all(&buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeaderExtensionSchema;

impl RecordSchema for HeaderExtensionSchema {
    fn name(&self) -> &str {
        "asf-header-extension"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn read(&self, input: &mut RecordReader<'_>, _ctx: &ReadContext<'_>) -> Result<Body> {
        Ok(Body::decoded(HeaderExtensionPrefix {
            reserved1: Guid(input.read_array()?),
            reserved2: input.read_u16_le()?,
            data_size: input.read_u32_le()?,
        }))
    }
}
