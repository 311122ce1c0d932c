//! ASF integration tests
//!
//! Header Object bookkeeping and 64-bit object sizes, including a data
//! object larger than 4 GiB that is never read.

mod common;

use std::cell::Cell;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::rc::Rc;

use assert_matches::assert_matches;
use common::{asf_header, asf_object, concat, init_tracing, pattern};
use mediabox::container::schemas::asf::{
    HeaderExtensionPrefix, HeaderObjectPrefix, CONTENT_DESCRIPTION_OBJECT, DATA_OBJECT,
    FILE_PROPERTIES_OBJECT, HEADER_EXTENSION_OBJECT, HEADER_EXTENSION_RESERVED,
    STREAM_PROPERTIES_OBJECT,
};
use mediabox::container::{
    decode_header, Body, Convention, Error, Identifier, OpaqueBody, Parser, Tree,
};

const HUGE: u64 = 0x1_0000_0000 + 0x1234;

/// Source that holds `head` and reads zeros from there up to `len`,
/// counting every byte handed out.
struct SparseSource {
    head: Vec<u8>,
    len: u64,
    pos: u64,
    served: Rc<Cell<u64>>,
}

impl Read for SparseSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = (self.len.saturating_sub(self.pos)).min(buf.len() as u64) as usize;
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            *byte = self
                .head
                .get((self.pos + i as u64) as usize)
                .copied()
                .unwrap_or(0);
        }
        self.pos += n as u64;
        self.served.set(self.served.get() + n as u64);
        Ok(n)
    }
}

impl Seek for SparseSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(d) => self.len as i128 + d as i128,
            SeekFrom::Current(d) => self.pos as i128 + d as i128,
        };
        if target < 0 {
            return Err(io::ErrorKind::InvalidInput.into());
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

// ===== Fixture functions =====

fn data_object_header(size: u64) -> Vec<u8> {
    let mut out = DATA_OBJECT.0.to_vec();
    out.extend_from_slice(&size.to_le_bytes());
    out
}

fn header_object() -> Vec<u8> {
    asf_header(&[
        asf_object(FILE_PROPERTIES_OBJECT, &pattern(80)),
        asf_object(STREAM_PROPERTIES_OBJECT, &pattern(54)),
    ])
}

fn header_extension(children: &[Vec<u8>]) -> Vec<u8> {
    let data = concat(children);
    let mut content = HEADER_EXTENSION_RESERVED.0.to_vec();
    content.extend_from_slice(&6u16.to_le_bytes());
    content.extend_from_slice(&(data.len() as u32).to_le_bytes());
    content.extend_from_slice(&data);
    asf_object(HEADER_EXTENSION_OBJECT, &content)
}

fn parse(bytes: Vec<u8>) -> Tree {
    init_tracing();
    Parser::asf().parse_bytes(bytes).unwrap()
}

// ===== Tests =====

#[test]
fn test_header_object_round_trip() {
    let bytes = concat(&[header_object(), data_object_header(50), pattern(26)]);
    let tree = parse(bytes.clone());

    assert_eq!(tree.roots().len(), 2);
    let header = tree.roots()[0];
    assert_eq!(tree[header].children().len(), 2);
    let prefix = tree[header].payload::<HeaderObjectPrefix>().unwrap();
    assert_eq!(prefix.object_count, 2);
    assert_eq!((prefix.reserved1, prefix.reserved2), (1, 2));
    assert_eq!(tree.to_bytes().unwrap(), bytes);
}

#[test]
fn test_object_count_follows_children() {
    let mut tree = parse(header_object());
    let header = tree.container(tree.roots()[0]).unwrap();

    let description = tree
        .create_raw(CONTENT_DESCRIPTION_OBJECT, pattern(10))
        .unwrap();
    tree.append_child(header, description).unwrap();

    let out = tree.to_bytes().unwrap();
    assert_eq!(&out[24..28], &3u32.to_le_bytes());
    assert_eq!(&out[16..24], &(out.len() as u64).to_le_bytes());
    assert_eq!(out.len(), header_object().len() + 34);

    let reparsed = parse(out);
    let prefix = reparsed[reparsed.roots()[0]]
        .payload::<HeaderObjectPrefix>()
        .unwrap();
    assert_eq!(prefix.object_count, 3);
}

#[test]
fn test_header_extension_data_size_follows_children() {
    let extension = header_extension(&[asf_object(STREAM_PROPERTIES_OBJECT, &pattern(6))]);
    let bytes = asf_header(&[extension]);
    let mut tree = parse(bytes.clone());
    assert_eq!(tree.to_bytes().unwrap(), bytes);

    let header = tree.roots()[0];
    let ext = tree.container(tree[header].children()[0]).unwrap();
    let prefix = tree[ext.node()].payload::<HeaderExtensionPrefix>().unwrap();
    assert_eq!(prefix.data_size, 30);
    assert_eq!(prefix.reserved1, HEADER_EXTENSION_RESERVED);

    let extra = tree.create_raw(FILE_PROPERTIES_OBJECT, pattern(2)).unwrap();
    tree.append_child(ext, extra).unwrap();
    let out = tree.to_bytes().unwrap();
    // Header object (24 + 6), extension header (24), reserved GUID and u16.
    assert_eq!(&out[72..76], &56u32.to_le_bytes());
    assert_eq!(&out[24..28], &1u32.to_le_bytes());
}

#[test]
fn test_huge_object_header_decodes() {
    let header = data_object_header(HUGE);
    let decoded = decode_header(&mut Cursor::new(header), Convention::Asf, 0, 24, true).unwrap();

    assert_eq!(decoded.identifier, Identifier::Guid(DATA_OBJECT));
    assert_eq!(decoded.size(), HUGE);
    assert_eq!(decoded.header_len(), 24);
    assert_eq!(decoded.extent.content_len, HUGE - 24);
}

#[test]
fn test_huge_object_parsed_without_reading_payload() {
    init_tracing();
    let head = concat(&[header_object(), data_object_header(HUGE)]);
    let header_len = header_object().len() as u64;
    let served = Rc::new(Cell::new(0));
    let source = SparseSource {
        len: header_len + HUGE,
        head,
        pos: 0,
        served: Rc::clone(&served),
    };

    let tree = Parser::asf().parse(source).unwrap();
    let data = tree.roots()[1];
    assert_eq!(tree[data].declared_size(), Some(HUGE));
    assert_matches!(
        tree[data].body(),
        Body::Raw(OpaqueBody::Deferred { offset, len })
            if *offset == header_len + 24 && *len == HUGE - 24
    );
    assert_eq!(tree.total_declared_size(), header_len + HUGE);
    assert!(served.get() < 1024, "read {} bytes", served.get());
}

#[test]
fn test_huge_object_missing_from_file() {
    let bytes = concat(&[header_object(), data_object_header(HUGE)]);
    let offset = header_object().len() as u64;
    let err = Parser::asf().parse_bytes(bytes).unwrap_err();
    assert_matches!(
        err,
        Error::TruncatedStream { offset: o, need, have: 24 } if o == offset && need == HUGE
    );
}

#[test]
fn test_fourcc_rejected() {
    let mut tree = Tree::new(Convention::Asf);
    let err = tree
        .create_raw(Identifier::fourcc(b"LIST"), Vec::new())
        .unwrap_err();
    assert_matches!(err, Error::UnsupportedIdentifier { .. });
}
