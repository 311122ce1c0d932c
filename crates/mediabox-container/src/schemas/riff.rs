//! RIFF `RIFF`/`LIST` chunks and `INFO` text leaves.

use std::any::Any;
use std::io::{self, Write};

use crate::payload::{Body, Payload, WriteContext};
use crate::registry::RecordSchema;
use crate::source::RecordReader;
use crate::{FourCc, ReadContext, Registry, Result};

pub const RIFF: FourCc = FourCc(*b"RIFF");
pub const LIST: FourCc = FourCc(*b"LIST");
pub const INFO: FourCc = FourCc(*b"INFO");

/// Text chunks found in `LIST INFO`.
pub const INFO_TAGS: &[FourCc] = &[
    FourCc(*b"IARL"),
    FourCc(*b"IART"),
    FourCc(*b"ICMS"),
    FourCc(*b"ICMT"),
    FourCc(*b"ICOP"),
    FourCc(*b"ICRD"),
    FourCc(*b"IENG"),
    FourCc(*b"IGNR"),
    FourCc(*b"IKEY"),
    FourCc(*b"INAM"),
    FourCc(*b"IPRD"),
    FourCc(*b"ISBJ"),
    FourCc(*b"ISFT"),
    FourCc(*b"ISRC"),
    FourCc(*b"ITCH"),
    FourCc(*b"ITRK"),
];

/// Option key selecting how `INFO` text is decoded (`utf-8` or `latin1`).
pub const ENCODING_OPTION: &str = "encoding";

/// Add the RIFF built-ins to `registry`.
pub fn register(registry: &mut Registry) {
    registry.register(RIFF, ListSchema);
    registry.register(LIST, ListSchema);
    for &tag in INFO_TAGS {
        registry.register_fn(tag, "info-text", read_info_text);
    }
}

/// Four-character form type that opens a `RIFF` or `LIST` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormType(pub FourCc);

impl Payload for FormType {
    fn encoded_len(&self) -> u64 {
        4
    }

    fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
        out.write_all(&self.0 .0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `RIFF` and `LIST`: a form type followed by sub-chunks.
#[derive(Debug, Clone, Copy)]
pub struct ListSchema;

impl RecordSchema for ListSchema {
    fn name(&self) -> &str {
        "list"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn read(&self, input: &mut RecordReader<'_>, _ctx: &ReadContext<'_>) -> Result<Body> {
        Ok(Body::decoded(FormType(FourCc(input.read_array()?))))
    }
}

/// Character set of an `INFO` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Latin1,
}

impl TextEncoding {
    fn from_option(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("latin1" | "latin-1" | "iso-8859-1") => Self::Latin1,
            _ => Self::Utf8,
        }
    }
}

/// Text of an `INFO` chunk, kept as the exact bytes read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoText {
    bytes: Vec<u8>,
    encoding: TextEncoding,
}

impl InfoText {
    /// UTF-8 text without a terminator.
    pub fn new(text: &str) -> Self {
        Self {
            bytes: text.as_bytes().to_vec(),
            encoding: TextEncoding::Utf8,
        }
    }

    /// Decoded text, without trailing NULs.
    pub fn text(&self) -> String {
        let end = self
            .bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let bytes = &self.bytes[..end];
        match self.encoding {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    /// Replace the text, keeping the chunk's encoding.
    pub fn set_text(&mut self, text: &str) {
        self.bytes = match self.encoding {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        };
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Payload for InfoText {
    fn encoded_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
        out.write_all(&self.bytes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn read_info_text(input: &mut RecordReader<'_>, ctx: &ReadContext<'_>) -> Result<Body> {
    let encoding = TextEncoding::from_option(ctx.options().extra(ENCODING_OPTION));
    Ok(Body::decoded(InfoText {
        bytes: input.read_rest()?,
        encoding,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ancestry, Convention, Identifier, ParseOptions};
    use std::io::Cursor;

    fn read_info(content: &[u8], options: &ParseOptions) -> InfoText {
        let id = Identifier::fourcc(b"INAM");
        let ancestry = Ancestry::root();
        let ctx = ReadContext::new(Convention::Riff, &id, 0, &ancestry, options);
        let mut cursor = Cursor::new(content.to_vec());
        let mut input = RecordReader::new(&mut cursor, 8, content.len() as u64);
        let body = read_info_text(&mut input, &ctx).unwrap();
        body.downcast_ref::<InfoText>().unwrap().clone()
    }

    #[test]
    fn test_builtin_registry() {
        let registry = Registry::riff();
        assert!(registry.is_container(&Identifier::fourcc(b"RIFF")));
        assert!(registry.is_container(&Identifier::fourcc(b"LIST")));
        assert!(!registry.is_container(&Identifier::fourcc(b"INAM")));
        assert!(registry.resolve(&Identifier::fourcc(b"inam")).is_known());
        assert!(!registry.resolve(&Identifier::fourcc(b"data")).is_known());
    }

    #[test]
    fn test_info_text_trims_terminator() {
        let info = read_info(b"Title\0", &ParseOptions::default());
        assert_eq!(info.text(), "Title");
        assert_eq!(info.as_bytes(), b"Title\0");
        assert_eq!(info.encoding(), TextEncoding::Utf8);
    }

    #[test]
    fn test_info_text_latin1_option() {
        let options = ParseOptions::builder()
            .extra(ENCODING_OPTION, "Latin1")
            .build();
        let mut info = read_info(b"Caf\xe9", &options);
        assert_eq!(info.encoding(), TextEncoding::Latin1);
        assert_eq!(info.text(), "Café");

        info.set_text("Déjà");
        assert_eq!(info.as_bytes(), b"D\xe9j\xe0");
    }

    #[test]
    fn test_form_type_write() {
        let mut out = Vec::new();
        FormType(INFO)
            .write_to(&mut out, &WriteContext::default())
            .unwrap();
        assert_eq!(out, b"INFO");
    }
}
