//! Recursive descent reader.

use std::io::{Seek, SeekFrom};

use crate::header::{decode_header, RecordHeader};
use crate::options::{LeafErrorPolicy, UnknownPolicy};
use crate::payload::Body;
use crate::registry::{RecordSchema, Resolved};
use crate::source::{seek_checked, ByteSource, OpaqueBody, RecordReader};
use crate::tree::{Node, NodeId, Tree};
use crate::{Ancestry, Convention, Error, Identifier, ParseOptions, ReadContext, Registry, Result};

/// Parse every record in `source` into a tree that keeps the source for
/// deferred reads.
pub(crate) fn read_tree(
    mut source: Box<dyn ByteSource>,
    registry: &Registry,
    options: &ParseOptions,
) -> Result<Tree> {
    let source_len = source.size()?;
    let convention = registry.convention();
    tracing::debug!("Parsing {} bytes as {}", source_len, convention);

    let mut reader = Reader {
        registry,
        options,
        convention,
        source: &mut *source,
        source_len,
        tree: Tree::new(convention),
        dropped: false,
    };
    let trailing = reader.read_range(0, source_len, None, &Ancestry::root())?;
    let dropped = reader.dropped;
    let mut tree = reader.tree;
    tree.trailing = trailing;

    // Dropped records still count in their parents' declared sizes.
    if dropped {
        tree.sync_sizes()?;
    }
    tracing::debug!("Parsed {} records", tree.len());
    tree.source = Some(std::cell::RefCell::new(source));
    Ok(tree)
}

struct Reader<'p> {
    registry: &'p Registry,
    options: &'p ParseOptions,
    convention: Convention,
    source: &'p mut dyn ByteSource,
    source_len: u64,
    tree: Tree,
    dropped: bool,
}

impl<'p> Reader<'p> {
    /// Read records from `[start, end)`. Returns the leftover bytes too short
    /// to hold a header.
    fn read_range(
        &mut self,
        start: u64,
        end: u64,
        parent: Option<NodeId>,
        ancestry: &Ancestry<'_>,
    ) -> Result<Option<OpaqueBody>> {
        let min = self.convention.min_header_len();
        let mut offset = start;
        while offset < end {
            let available = end - offset;
            if available < min {
                tracing::debug!("Keeping {} trailing bytes at offset {}", available, offset);
                seek_checked(&mut *self.source, end, self.source_len)?;
                return Ok(Some(OpaqueBody::Deferred {
                    offset,
                    len: available,
                }));
            }
            offset += self.read_record(offset, available, parent, ancestry)?;
            // Schemas may stop anywhere inside their record; the next sibling
            // always starts at the declared end.
            tracing::trace!("Repositioning cursor to offset {}", offset);
            seek_checked(&mut *self.source, offset, self.source_len)?;
        }
        Ok(None)
    }

    /// Read one record at `offset` and return its size.
    fn read_record(
        &mut self,
        offset: u64,
        available: u64,
        parent: Option<NodeId>,
        ancestry: &Ancestry<'_>,
    ) -> Result<u64> {
        let top_level = parent.is_none();
        seek_checked(&mut *self.source, offset, self.source_len)?;
        let header = decode_header(&mut *self.source, self.convention, offset, available, top_level)?;
        let size = header.size();
        if size > available {
            return Err(if top_level {
                Error::TruncatedStream {
                    offset,
                    need: size,
                    have: available,
                }
            } else {
                Error::malformed(
                    offset,
                    format!(
                        "{} declares {} bytes but only {} remain in its parent",
                        header.identifier, size, available
                    ),
                )
            });
        }
        if ancestry.depth() >= self.options.max_depth {
            return Err(Error::NestingTooDeep {
                depth: ancestry.depth() + 1,
                offset,
            });
        }

        let identifier = header.identifier;
        let content_start = offset + header.header_len();
        let content_len = header.extent.content_len;
        let registry = self.registry;

        let schema = match registry.resolve(&identifier) {
            Resolved::Schema(schema) => schema,
            Resolved::Opaque => {
                match self.options.unknown_policy {
                    UnknownPolicy::Preserve => {
                        tracing::trace!("Keeping unknown record {} at offset {}", identifier, offset);
                        let body = Body::Raw(OpaqueBody::Deferred {
                            offset: content_start,
                            len: content_len,
                        });
                        self.insert(record_node(&header, offset, false, body), parent)?;
                    }
                    UnknownPolicy::Drop => {
                        tracing::warn!(
                            "Dropping unknown record {} ({} bytes) at offset {}",
                            identifier,
                            size,
                            offset
                        );
                        self.dropped = true;
                    }
                }
                return Ok(size);
            }
        };

        if schema.is_container() && !self.expands(&identifier, ancestry) {
            tracing::debug!("Path filter skips {} at offset {}", identifier, offset);
            self.insert_unexpanded(&header, offset, true, parent)?;
            return Ok(size);
        }

        let decoded = self.decode(
            schema,
            &identifier,
            offset,
            content_start,
            content_len,
            ancestry,
        );
        let (body, consumed) = match decoded {
            Ok(decoded) => decoded,
            Err(err)
                if err.is_schema_error() && self.options.leaf_errors == LeafErrorPolicy::Recover =>
            {
                tracing::warn!("Keeping {} at offset {} as opaque: {}", identifier, offset, err);
                self.insert_unexpanded(&header, offset, schema.is_container(), parent)?;
                return Ok(size);
            }
            Err(err) => return Err(err),
        };
        tracing::debug!(
            "Decoded {} at offset {} with {} ({} of {} bytes)",
            identifier,
            offset,
            schema.name(),
            consumed,
            content_len
        );

        let id = self.insert(record_node(&header, offset, schema.is_container(), body), parent)?;
        let trailing = if schema.is_container() {
            let child_ancestry = ancestry.child(&identifier);
            let children = self.read_range(
                content_start + consumed,
                content_start + content_len,
                Some(id),
                &child_ancestry,
            );
            match children {
                Ok(trailing) => trailing,
                Err(err)
                    if err.is_recoverable()
                        && self.options.leaf_errors == LeafErrorPolicy::Recover =>
                {
                    tracing::warn!(
                        "Keeping {} at offset {} unexpanded: {}",
                        identifier,
                        offset,
                        err
                    );
                    self.collapse(id, content_start, content_len)?;
                    return Ok(size);
                }
                Err(err) => return Err(err),
            }
        } else if consumed < content_len {
            Some(OpaqueBody::Deferred {
                offset: content_start + consumed,
                len: content_len - consumed,
            })
        } else {
            None
        };
        self.tree.node_mut(id)?.trailing = trailing;
        Ok(size)
    }

    /// Let `schema` decode the content (or, for containers, its prefix).
    fn decode(
        &mut self,
        schema: &dyn RecordSchema,
        identifier: &Identifier,
        offset: u64,
        content_start: u64,
        content_len: u64,
        ancestry: &Ancestry<'_>,
    ) -> Result<(Body, u64)> {
        self.source.seek(SeekFrom::Start(content_start))?;
        let ctx = ReadContext::new(self.convention, identifier, offset, ancestry, self.options);
        let mut input = RecordReader::new(&mut *self.source, content_start, content_len);
        let body = schema.read(&mut input, &ctx).map_err(|err| {
            if err.is_schema_error() {
                err
            } else {
                Error::schema(schema.name(), *identifier, offset, err.to_string())
            }
        })?;
        Ok((body, input.consumed()))
    }

    /// Whether the ISO-BMFF path filter lets the reader into `identifier`.
    fn expands(&self, identifier: &Identifier, ancestry: &Ancestry<'_>) -> bool {
        if self.convention != Convention::IsoBmff {
            return true;
        }
        let Some(filter) = &self.options.path_filter else {
            return true;
        };
        let mut path = ancestry.to_vec();
        path.push(*identifier);
        filter.allows(&path, self.convention)
    }

    fn insert_unexpanded(
        &mut self,
        header: &RecordHeader,
        offset: u64,
        is_container: bool,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        let body = Body::Raw(OpaqueBody::Deferred {
            offset: offset + header.header_len(),
            len: header.extent.content_len,
        });
        let mut node = record_node(header, offset, is_container, body);
        node.expanded = false;
        self.insert(node, parent)
    }

    /// Turn an expanded container back into one opaque record, freeing the
    /// children read so far.
    fn collapse(&mut self, id: NodeId, content_start: u64, content_len: u64) -> Result<()> {
        let node = self.tree.node_mut(id)?;
        let children = std::mem::take(&mut node.children);
        node.body = Body::Raw(OpaqueBody::Deferred {
            offset: content_start,
            len: content_len,
        });
        node.trailing = None;
        node.expanded = false;
        for child in children {
            self.tree.free_subtree(child);
        }
        Ok(())
    }

    fn insert(&mut self, node: Node, parent: Option<NodeId>) -> Result<NodeId> {
        let id = self.tree.alloc(node);
        match parent {
            Some(parent) => {
                self.tree.node_mut(parent)?.children.push(id);
                self.tree.node_mut(id)?.parent = Some(parent);
            }
            None => self.tree.roots.push(id),
        }
        Ok(id)
    }
}

fn record_node(header: &RecordHeader, offset: u64, is_container: bool, body: Body) -> Node {
    let mut node = Node::new(header.identifier, is_container, body);
    node.offset = Some(offset);
    node.declared = Some(header.extent);
    node.open_ended = header.open_ended;
    node
}
