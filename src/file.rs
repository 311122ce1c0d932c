//! Opening and saving container files.

use std::io::{BufWriter, Write};
use std::path::Path;

use mediabox_container::{Convention, Error, ParseOptions, Parser, Result, Tree};

use crate::id3;

/// Built-in parser for `convention`, with the ID3v2 chunk schema added for
/// RIFF.
pub fn parser(convention: Convention) -> Parser {
    let mut parser = Parser::for_convention(convention);
    if convention == Convention::Riff {
        id3::register(parser.registry_mut());
    }
    parser
}

/// Parse the file at `path` with default options.
pub fn open(path: impl AsRef<Path>, convention: Convention) -> Result<Tree> {
    open_with(path, convention, ParseOptions::default())
}

/// Parse the file at `path`.
pub fn open_with(
    path: impl AsRef<Path>,
    convention: Convention,
    options: ParseOptions,
) -> Result<Tree> {
    parser(convention).with_options(options).open(path)
}

/// Parse an in-memory buffer with default options.
pub fn parse_bytes(bytes: impl Into<Vec<u8>>, convention: Convention) -> Result<Tree> {
    parser(convention).parse_bytes(bytes)
}

/// Write `tree` to `path`, replacing any existing file atomically.
///
/// The tree is serialized into a temporary file in the destination
/// directory, which is then renamed over `path`. Saving over the file the
/// tree was opened from is fine: deferred records are copied from the old
/// file before it is replaced. Returns the number of bytes written.
pub fn save(tree: &Tree, path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = tempfile::NamedTempFile::new_in(dir)?;
    let mut out = BufWriter::new(temp);
    let written = tree.write_to(&mut out)?;
    out.flush()?;
    let temp = out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved {} bytes to {:?}", written, path);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3::Id3Tag;
    use tempfile::TempDir;

    const FREE_BOX: &[u8] = b"\x00\x00\x00\x0cfree\x01\x02\x03\x04";

    #[test]
    fn test_riff_parser_knows_id3() {
        let riff = parser(Convention::Riff);
        assert!(riff.registry().resolve(&id3::ID3_CHUNK.into()).is_known());
        let iso = parser(Convention::IsoBmff);
        assert!(!iso.registry().resolve(&id3::ID3_CHUNK.into()).is_known());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, FREE_BOX).unwrap();

        let tree = open(&path, Convention::IsoBmff).unwrap();
        let out = dir.path().join("copy.mp4");
        let written = save(&tree, &out).unwrap();

        assert_eq!(written, FREE_BOX.len() as u64);
        assert_eq!(std::fs::read(&out).unwrap(), FREE_BOX);
    }

    #[test]
    fn test_save_over_source_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, FREE_BOX).unwrap();

        let mut tree = open(&path, Convention::IsoBmff).unwrap();
        let skip = tree
            .create_raw(mediabox_container::Identifier::fourcc(b"skip"), vec![9; 2])
            .unwrap();
        tree.push_root(skip).unwrap();
        save(&tree, &path).unwrap();

        let mut expected = FREE_BOX.to_vec();
        expected.extend_from_slice(b"\x00\x00\x00\x0askip\x09\x09");
        assert_eq!(std::fs::read(&path).unwrap(), expected);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = open(dir.path().join("missing.wav"), Convention::Riff).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_parse_bytes_riff_id3() {
        let mut bytes = b"id3 \x0c\x00\x00\x00ID3\x04\x00\x00\x00\x00\x00\x02hi".to_vec();
        let tree = parse_bytes(bytes.clone(), Convention::Riff).unwrap();
        let tag = tree[tree.roots()[0]].payload::<Id3Tag>().unwrap();
        assert_eq!(tag.version(), (4, 0));
        assert_eq!(tag.frame_data(), b"hi");

        bytes.truncate(8);
        assert!(parse_bytes(bytes, Convention::Riff).is_err());
    }
}
