//! ISO-BMFF container boxes and the `ftyp` leaf.

use std::any::Any;
use std::io::{self, Write};

use bytes::{BufMut, BytesMut};

use crate::payload::{Body, Payload, PrefixBytes, WriteContext};
use crate::registry::{ContainerSchema, RecordSchema};
use crate::source::RecordReader;
use crate::{FourCc, ReadContext, Registry, Result};

pub const FTYP: FourCc = FourCc(*b"ftyp");
pub const STYP: FourCc = FourCc(*b"styp");
pub const MOOV: FourCc = FourCc(*b"moov");
pub const TRAK: FourCc = FourCc(*b"trak");
pub const TREF: FourCc = FourCc(*b"tref");
pub const EDTS: FourCc = FourCc(*b"edts");
pub const MDIA: FourCc = FourCc(*b"mdia");
pub const MINF: FourCc = FourCc(*b"minf");
pub const DINF: FourCc = FourCc(*b"dinf");
pub const STBL: FourCc = FourCc(*b"stbl");
pub const MVEX: FourCc = FourCc(*b"mvex");
pub const MOOF: FourCc = FourCc(*b"moof");
pub const TRAF: FourCc = FourCc(*b"traf");
pub const MFRA: FourCc = FourCc(*b"mfra");
pub const UDTA: FourCc = FourCc(*b"udta");
pub const ILST: FourCc = FourCc(*b"ilst");
pub const SINF: FourCc = FourCc(*b"sinf");
pub const SCHI: FourCc = FourCc(*b"schi");
pub const META: FourCc = FourCc(*b"meta");
pub const STSD: FourCc = FourCc(*b"stsd");
pub const DREF: FourCc = FourCc(*b"dref");

/// Boxes whose content is nothing but child boxes.
pub const PLAIN_CONTAINERS: &[FourCc] = &[
    MOOV, TRAK, TREF, EDTS, MDIA, MINF, DINF, STBL, MVEX, MOOF, TRAF, MFRA, UDTA, ILST, SINF,
    SCHI,
];

/// Add the ISO-BMFF built-ins to `registry`.
pub fn register(registry: &mut Registry) {
    for &code in PLAIN_CONTAINERS {
        registry.register_container(code);
    }
    registry.register(META, MetaSchema);
    // Full boxes: version/flags plus a 32-bit entry count.
    registry.register(STSD, ContainerSchema::with_prefix("stsd", 8));
    registry.register(DREF, ContainerSchema::with_prefix("dref", 8));
    registry.register_fn(FTYP, "ftyp", read_file_type);
    registry.register_fn(STYP, "styp", read_file_type);
}

/// `meta`: an ISO full box, except in QuickTime files where the `hdlr`
/// child follows the header directly.
#[derive(Debug, Clone, Copy)]
pub struct MetaSchema;

impl RecordSchema for MetaSchema {
    fn name(&self) -> &str {
        "meta"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn read(&self, input: &mut RecordReader<'_>, _ctx: &ReadContext<'_>) -> Result<Body> {
        if input.remaining() >= 8 {
            let head = input.peek_array::<8>()?;
            if &head[4..8] == b"hdlr" {
                return Ok(Body::Empty);
            }
        }
        Ok(Body::decoded(PrefixBytes(input.read_bytes(4)?)))
    }
}

/// File type box (`ftyp`, and `styp` in segments).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub major_brand: FourCc,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCc>,
}

impl FileType {
    /// Whether `brand` is the major brand or listed as compatible.
    pub fn has_brand(&self, brand: FourCc) -> bool {
        self.major_brand == brand || self.compatible_brands.contains(&brand)
    }
}

impl Payload for FileType {
    fn encoded_len(&self) -> u64 {
        8 + 4 * self.compatible_brands.len() as u64
    }

    fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(self.encoded_len() as usize);
        buf.put_slice(&self.major_brand.0);
        buf.put_u32(self.minor_version);
        for brand in &self.compatible_brands {
            buf.put_slice(&brand.0);
        }
        out.write_all(&buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Brands are read in whole four-byte steps; a ragged tail stays trailing.
fn read_file_type(input: &mut RecordReader<'_>, _ctx: &ReadContext<'_>) -> Result<Body> {
    let major_brand = FourCc(input.read_array()?);
    let minor_version = input.read_u32_be()?;
    let mut compatible_brands = Vec::with_capacity((input.remaining() / 4) as usize);
    while input.remaining() >= 4 {
        compatible_brands.push(FourCc(input.read_array()?));
    }
    Ok(Body::decoded(FileType {
        major_brand,
        minor_version,
        compatible_brands,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ancestry, Convention, Identifier, ParseOptions};
    use std::io::Cursor;

    fn read_with(schema: &dyn RecordSchema, content: &[u8]) -> (Result<Body>, u64) {
        let id = Identifier::fourcc(b"test");
        let options = ParseOptions::default();
        let ancestry = Ancestry::root();
        let ctx = ReadContext::new(Convention::IsoBmff, &id, 0, &ancestry, &options);
        let mut cursor = Cursor::new(content.to_vec());
        let mut input = RecordReader::new(&mut cursor, 8, content.len() as u64);
        let body = schema.read(&mut input, &ctx);
        (body, input.consumed())
    }

    #[test]
    fn test_builtin_registry() {
        let registry = Registry::iso_bmff();
        for code in [b"moov", b"trak", b"mdia", b"minf", b"stbl", b"udta", b"meta", b"stsd"] {
            assert!(registry.is_container(&Identifier::fourcc(code)), "{code:?}");
        }
        assert!(!registry.is_container(&Identifier::fourcc(b"ftyp")));
        assert!(!registry.resolve(&Identifier::fourcc(b"mvhd")).is_known());
    }

    #[test]
    fn test_meta_full_box() {
        let mut content = vec![0, 0, 0, 0];
        content.extend_from_slice(b"\x00\x00\x00\x21hdlr");
        let (body, consumed) = read_with(&MetaSchema, &content);
        assert_eq!(body.unwrap().len(), 4);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_meta_quicktime() {
        let content = b"\x00\x00\x00\x21hdlr".to_vec();
        let (body, consumed) = read_with(&MetaSchema, &content);
        assert!(body.unwrap().is_empty());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn test_file_type() {
        let content = b"isom\x00\x00\x02\x00isomiso2mp41\x00\x00".to_vec();
        let schema = crate::registry::FnSchema::new("ftyp", read_file_type);
        let (body, consumed) = read_with(&schema, &content);
        let body = body.unwrap();
        let ftyp = body.downcast_ref::<FileType>().unwrap();
        assert_eq!(ftyp.major_brand, FourCc(*b"isom"));
        assert_eq!(ftyp.minor_version, 0x200);
        assert_eq!(ftyp.compatible_brands.len(), 3);
        assert!(ftyp.has_brand(FourCc(*b"mp41")));
        assert!(!ftyp.has_brand(FourCc(*b"avc1")));
        // The two stray bytes are left for the trailing slot.
        assert_eq!(consumed, 20);

        let mut out = Vec::new();
        ftyp.write_to(&mut out, &WriteContext::default()).unwrap();
        assert_eq!(out, &content[..20]);
    }
}
