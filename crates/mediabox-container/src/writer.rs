//! Serialization back to bytes.

use std::io::{self, Read, Seek, SeekFrom, Write};

use bytes::BytesMut;

use crate::header::{encode_extent, Extent};
use crate::payload::{Body, WriteContext};
use crate::source::OpaqueBody;
use crate::tree::{NodeId, Tree};
use crate::{Error, Result};

/// Counts bytes on their way to the real sink.
struct CountingWriter<'w> {
    inner: &'w mut dyn Write,
    count: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Tree {
    /// Serialize every top-level record. Returns the number of bytes written.
    ///
    /// Sizes are recomputed bottom-up first, so the output is consistent even
    /// if declared sizes were left stale by [`Tree::set_size`].
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut layout = Vec::new();
        for &root in &self.roots {
            self.layout(root, &mut layout)?;
        }
        let mut out = CountingWriter {
            inner: out,
            count: 0,
        };
        for (index, &root) in self.roots.iter().enumerate() {
            let last = index + 1 == self.roots.len();
            self.write_record(root, &layout, last, &mut out)?;
        }
        if let Some(trailing) = &self.trailing {
            self.write_opaque(trailing, &mut out)?;
        }
        tracing::debug!("Wrote {} records, {} bytes", self.roots.len(), out.count);
        Ok(out.count)
    }

    /// Serialize one record and its subtree, attached or not.
    pub fn write_node<W: Write>(&self, id: NodeId, out: &mut W) -> Result<u64> {
        let mut layout = Vec::new();
        self.layout(id, &mut layout)?;
        let mut out = CountingWriter {
            inner: out,
            count: 0,
        };
        self.write_record(id, &layout, false, &mut out)?;
        Ok(out.count)
    }

    /// Serialize the whole tree into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    fn write_record(
        &self,
        id: NodeId,
        layout: &[Option<Extent>],
        last_root: bool,
        out: &mut CountingWriter<'_>,
    ) -> Result<()> {
        let node = self.node(id)?;
        let extent = extent_of(layout, id)?;

        let mut header = BytesMut::with_capacity(extent.header_len as usize);
        encode_extent(self.convention, &node.identifier, &extent, &mut header)?;
        // Size 0 stays legal only while the record is unchanged and last.
        if node.open_ended && last_root && node.declared == Some(extent) {
            header[..4].copy_from_slice(&[0; 4]);
        }
        out.write_all(&header)?;

        match &node.body {
            Body::Empty => {}
            Body::Raw(opaque) => self.write_opaque(opaque, out)?,
            Body::Decoded(payload) => {
                let mut children_len = node.trailing.as_ref().map_or(0, OpaqueBody::len);
                for &child in &node.children {
                    children_len += extent_of(layout, child)?.size();
                }
                let ctx = WriteContext {
                    child_count: node.children.len(),
                    children_len,
                };
                let before = out.count;
                payload.write_to(out, &ctx)?;
                let written = out.count - before;
                if written != payload.encoded_len() {
                    return Err(Error::schema(
                        "payload",
                        node.identifier,
                        node.offset.unwrap_or(0),
                        format!(
                            "wrote {} bytes but reported {}",
                            written,
                            payload.encoded_len()
                        ),
                    ));
                }
            }
        }

        for &child in &node.children {
            self.write_record(child, layout, false, out)?;
        }
        if let Some(trailing) = &node.trailing {
            self.write_opaque(trailing, out)?;
        }
        if extent.pad == 1 {
            out.write_all(&[0])?;
        }
        Ok(())
    }

    fn write_opaque(&self, opaque: &OpaqueBody, out: &mut CountingWriter<'_>) -> Result<()> {
        match opaque {
            OpaqueBody::Owned(bytes) => out.write_all(bytes)?,
            OpaqueBody::Deferred { offset, len } => {
                let mut source = self.source()?.borrow_mut();
                source.seek(SeekFrom::Start(*offset))?;
                let copied = io::copy(&mut (&mut **source).take(*len), out)?;
                if copied != *len {
                    return Err(Error::TruncatedStream {
                        offset: *offset + copied,
                        need: *len,
                        have: copied,
                    });
                }
            }
        }
        Ok(())
    }
}

fn extent_of(layout: &[Option<Extent>], id: NodeId) -> Result<Extent> {
    layout
        .get(id.0)
        .copied()
        .flatten()
        .ok_or(Error::UnknownNode(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PrefixBytes;
    use crate::{Convention, Identifier};

    fn id(code: &[u8; 4]) -> Identifier {
        Identifier::fourcc(code)
    }

    #[test]
    fn test_write_heap_tree() {
        let mut tree = Tree::new(Convention::IsoBmff);
        let moov = tree.create_container(id(b"moov")).unwrap();
        let mvhd = tree.create_raw(id(b"mvhd"), vec![7; 4]).unwrap();
        tree.append_child(moov, mvhd).unwrap();
        tree.push_root(moov.node()).unwrap();

        let bytes = tree.to_bytes().unwrap();
        assert_eq!(
            bytes,
            [
                &[0, 0, 0, 20][..],
                b"moov",
                &[0, 0, 0, 12],
                b"mvhd",
                &[7, 7, 7, 7]
            ]
            .concat()
        );
        assert_eq!(bytes.len() as u64, tree.total_computed_size().unwrap());
    }

    #[test]
    fn test_write_riff_pad() {
        let mut tree = Tree::new(Convention::Riff);
        let inam = tree.create_raw(id(b"INAM"), b"abc".to_vec()).unwrap();
        tree.push_root(inam).unwrap();
        assert_eq!(tree.to_bytes().unwrap(), b"INAM\x03\x00\x00\x00abc\x00");
    }

    #[test]
    fn test_write_node_detached() {
        let mut tree = Tree::new(Convention::IsoBmff);
        let meta = tree.create_container(id(b"meta")).unwrap();
        tree.set_body(meta.node(), Body::decoded(PrefixBytes(vec![0; 4])))
            .unwrap();
        let mut out = Vec::new();
        let written = tree.write_node(meta.node(), &mut out).unwrap();
        assert_eq!(written, 12);
        assert_eq!(out, b"\x00\x00\x00\x0cmeta\x00\x00\x00\x00");
    }

    #[test]
    fn test_payload_length_mismatch_is_reported() {
        #[derive(Debug)]
        struct Liar;
        impl crate::Payload for Liar {
            fn encoded_len(&self) -> u64 {
                4
            }
            fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
                out.write_all(&[1, 2])
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        let mut tree = Tree::new(Convention::IsoBmff);
        let leaf = tree.create_leaf(id(b"liar"), Body::decoded(Liar)).unwrap();
        tree.push_root(leaf).unwrap();
        assert!(tree.to_bytes().unwrap_err().is_schema_error());
    }

    #[test]
    fn test_deferred_without_source_fails() {
        let mut tree = Tree::new(Convention::IsoBmff);
        let leaf = tree
            .create_leaf(
                id(b"mdat"),
                Body::Raw(OpaqueBody::Deferred { offset: 0, len: 4 }),
            )
            .unwrap();
        tree.push_root(leaf).unwrap();
        assert!(matches!(tree.to_bytes(), Err(Error::Io(_))));
    }
}
