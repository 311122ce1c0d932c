//! Shared byte builders for integration tests.
//!
//! Each helper returns one complete record (header plus content) so tests
//! can concatenate them into realistic files without fixture binaries.

#![allow(dead_code)]

use mediabox::Guid;

/// Install a test-writer subscriber once so `RUST_LOG` works under
/// `cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// ISO-BMFF box with a 32-bit size.
pub fn iso_box(code: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = ((content.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(code);
    out.extend_from_slice(content);
    out
}

/// ISO-BMFF box using the 64-bit size field.
pub fn iso_large_box(code: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = 1u32.to_be_bytes().to_vec();
    out.extend_from_slice(code);
    out.extend_from_slice(&((content.len() + 16) as u64).to_be_bytes());
    out.extend_from_slice(content);
    out
}

/// ISO-BMFF `uuid` box.
pub fn iso_uuid_box(usertype: &[u8; 16], content: &[u8]) -> Vec<u8> {
    let mut out = ((content.len() + 24) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(b"uuid");
    out.extend_from_slice(usertype);
    out.extend_from_slice(content);
    out
}

/// Concatenate boxes.
pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// RIFF chunk, padded to an even length.
pub fn riff_chunk(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    if content.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// RIFF `LIST` (or `RIFF`) chunk with a form type and sub-chunks.
pub fn riff_list(tag: &[u8; 4], form: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut content = form.to_vec();
    for chunk in chunks {
        content.extend_from_slice(chunk);
    }
    riff_chunk(tag, &content)
}

/// ASF object with a 64-bit little-endian size.
pub fn asf_object(guid: Guid, content: &[u8]) -> Vec<u8> {
    let mut out = guid.0.to_vec();
    out.extend_from_slice(&((content.len() + 24) as u64).to_le_bytes());
    out.extend_from_slice(content);
    out
}

/// ASF Header Object with `children` after the six-byte prefix.
pub fn asf_header(children: &[Vec<u8>]) -> Vec<u8> {
    let mut content = (children.len() as u32).to_le_bytes().to_vec();
    content.extend_from_slice(&[0x01, 0x02]);
    for child in children {
        content.extend_from_slice(child);
    }
    asf_object(mediabox::container::schemas::asf::HEADER_OBJECT, &content)
}

/// `count` bytes of a repeating, recognizable pattern.
pub fn pattern(count: usize) -> Vec<u8> {
    (0..count).map(|i| (i % 251) as u8).collect()
}
