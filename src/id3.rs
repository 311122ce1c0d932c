//! ID3v2 tags embedded in RIFF files (`id3 ` / `ID3 ` chunks).
//!
//! The tag header carries a synchsafe size and a flag byte; the tag body is
//! kept as stored and only unescaped on request.

use std::any::Any;
use std::io::{self, Write};

use mediabox_bits::{bits, synchsafe, unsync};
use mediabox_container::{
    Body, Error, FourCc, Payload, ReadContext, RecordReader, Registry, Result, WriteContext,
};

/// Chunk tag for an embedded ID3v2 tag. Lookup ignores case and the
/// trailing space, so this covers `ID3 ` too.
pub const ID3_CHUNK: FourCc = FourCc(*b"id3 ");

const MAGIC: &[u8; 3] = b"ID3";
const HEADER_LEN: u64 = 10;

const FLAG_UNSYNCHRONISATION: u32 = 7;
const FLAG_EXTENDED_HEADER: u32 = 6;
const FLAG_EXPERIMENTAL: u32 = 5;
const FLAG_FOOTER: u32 = 4;

/// Add the ID3v2 chunk schema to a RIFF registry.
pub fn register(registry: &mut Registry) {
    registry.register_fn(ID3_CHUNK, "id3v2", read_tag);
}

/// An ID3v2 tag: version, flags and the still-escaped body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Tag {
    major: u8,
    revision: u8,
    flags: u8,
    body: Vec<u8>,
}

impl Id3Tag {
    /// Empty ID3v2.4 tag with no flags set.
    pub fn new() -> Self {
        Self {
            major: 4,
            revision: 0,
            flags: 0,
            body: Vec::new(),
        }
    }

    /// `(major, revision)`, e.g. `(3, 0)` for ID3v2.3.
    pub fn version(&self) -> (u8, u8) {
        (self.major, self.revision)
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_unsynchronised(&self) -> bool {
        bits::is_set(self.flags as u64, FLAG_UNSYNCHRONISATION)
    }

    pub fn has_extended_header(&self) -> bool {
        bits::is_set(self.flags as u64, FLAG_EXTENDED_HEADER)
    }

    pub fn is_experimental(&self) -> bool {
        bits::is_set(self.flags as u64, FLAG_EXPERIMENTAL)
    }

    /// Footer present (ID3v2.4 only). The footer itself stays in the
    /// chunk's trailing bytes.
    pub fn has_footer(&self) -> bool {
        bits::is_set(self.flags as u64, FLAG_FOOTER)
    }

    /// Body exactly as stored, unsynchronisation escapes included.
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Body with unsynchronisation undone.
    pub fn frame_data(&self) -> Vec<u8> {
        if self.is_unsynchronised() {
            unsync::decode(&self.body)
        } else {
            self.body.clone()
        }
    }

    /// Replace the body. The unsynchronisation flag is set, and the data
    /// escaped, only when the data contains a false sync.
    pub fn set_frame_data(&mut self, data: &[u8]) {
        let unsynchronise = unsync::needs_unsynchronisation(data);
        self.flags = bits::set_bits(
            self.flags as u64,
            FLAG_UNSYNCHRONISATION,
            FLAG_UNSYNCHRONISATION,
            unsynchronise as u64,
        ) as u8;
        self.body = if unsynchronise {
            unsync::encode(data)
        } else {
            data.to_vec()
        };
    }
}

impl Default for Id3Tag {
    fn default() -> Self {
        Self::new()
    }
}

impl Payload for Id3Tag {
    fn encoded_len(&self) -> u64 {
        HEADER_LEN + self.body.len() as u64
    }

    fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
        let len = u32::try_from(self.body.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "ID3 tag too large"))?;
        let size = synchsafe::encode_bytes(len)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        out.write_all(MAGIC)?;
        out.write_all(&[self.major, self.revision, self.flags])?;
        out.write_all(&size)?;
        out.write_all(&self.body)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn read_tag(input: &mut RecordReader<'_>, ctx: &ReadContext<'_>) -> Result<Body> {
    let fail = |message: String| Error::schema("id3v2", *ctx.identifier(), ctx.offset(), message);

    let header: [u8; 10] = input.read_array().map_err(|e| fail(e.to_string()))?;
    if &header[..3] != MAGIC {
        return Err(fail("missing ID3 magic".to_string()));
    }
    let size_bytes = [header[6], header[7], header[8], header[9]];
    if !synchsafe::is_synchsafe(u32::from_be_bytes(size_bytes)) {
        return Err(fail("tag size is not synchsafe".to_string()));
    }
    let size = synchsafe::decode_bytes(size_bytes) as u64;
    if size > input.remaining() {
        return Err(fail(format!(
            "tag size {} exceeds the {} bytes left in the chunk",
            size,
            input.remaining()
        )));
    }
    let body = input.read_bytes(size).map_err(|e| fail(e.to_string()))?;
    tracing::debug!("ID3v2.{}.{} tag, {} bytes", header[3], header[4], size);

    Ok(Body::decoded(Id3Tag {
        major: header[3],
        revision: header[4],
        flags: header[5],
        body,
    }))
}
