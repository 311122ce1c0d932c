//! Size recompute and delta propagation.
//!
//! Every attached node carries a declared [`Extent`]. Mutations never
//! rescan the tree: the changed node's size delta is added to its parent's
//! content, the parent re-derives its own framing (64-bit promotion, RIFF pad)
//! and hands its delta upward, and so on to the top level.

use crate::header::{Extent, RecordHeader};
use crate::tree::{Node, NodeId, Tree};
use crate::{Convention, Error, Result};

/// A node whose declared size disagrees with the bytes it would write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    pub node: NodeId,
    pub declared: Option<u64>,
    pub computed: u64,
}

/// Lay out `content_len` bytes for `node`, keeping its declared shape when
/// the content is unchanged.
///
/// A RIFF chunk read without its final pad byte keeps that shape only while
/// it is still the last record of its range (`last`).
fn frame(convention: Convention, node: &Node, content_len: u64, last: bool) -> Result<Extent> {
    if let Some(declared) = node.declared {
        let missing_pad =
            convention == Convention::Riff && declared.pad != declared.content_len & 1;
        if declared.content_len == content_len && (last || !missing_pad) {
            return Ok(declared);
        }
    }
    let prefer_large = node.declared.is_some_and(|extent| extent.large_size);
    Extent::for_content(convention, &node.identifier, content_len, prefer_large)
}

impl Tree {
    /// Bytes `id` would serialize to, computed bottom-up.
    pub fn computed_size(&self, id: NodeId) -> Result<u64> {
        Ok(self.computed_extent(id)?.size())
    }

    /// Layout `id` would serialize with.
    pub fn computed_extent(&self, id: NodeId) -> Result<Extent> {
        let mut layout = Vec::new();
        self.layout(id, &mut layout)
    }

    /// Bytes the whole tree would serialize to.
    pub fn total_computed_size(&self) -> Result<u64> {
        let mut layout = Vec::new();
        let mut total = self.trailing.as_ref().map_or(0, |t| t.len());
        for &root in &self.roots {
            total += self.layout(root, &mut layout)?.size();
        }
        Ok(total)
    }

    /// Sum of the declared sizes of the top-level records.
    pub fn total_declared_size(&self) -> u64 {
        let records: u64 = self
            .roots
            .iter()
            .filter_map(|&root| self.get(root).and_then(Node::declared_size))
            .sum();
        records + self.trailing.as_ref().map_or(0, |t| t.len())
    }

    /// Compute the layout of `id` and its subtree, recording each node's
    /// extent at its arena slot.
    pub(crate) fn layout(&self, id: NodeId, layout: &mut Vec<Option<Extent>>) -> Result<Extent> {
        let node = self.node(id)?;
        let mut content = node.own_len();
        for &child in &node.children {
            content += self.layout(child, layout)?.size();
        }
        let extent = frame(self.convention, node, content, self.ends_range(id))?;
        if layout.len() <= id.0 {
            layout.resize(id.0 + 1, None);
        }
        layout[id.0] = Some(extent);
        Ok(extent)
    }

    /// Set every declared size in `id`'s subtree to the computed one.
    pub(crate) fn seal(&mut self, id: NodeId) -> Result<Extent> {
        let mut layout = Vec::new();
        let extent = self.layout(id, &mut layout)?;
        self.apply_layout(&layout)?;
        Ok(extent)
    }

    fn apply_layout(&mut self, layout: &[Option<Extent>]) -> Result<()> {
        for (slot, extent) in layout.iter().enumerate() {
            if let Some(extent) = extent {
                let node = self.node_mut(NodeId(slot))?;
                if node.declared != Some(*extent) {
                    node.declared = Some(*extent);
                    node.open_ended = false;
                }
            }
        }
        Ok(())
    }

    /// Bring every declared size in line with the computed one.
    pub fn sync_sizes(&mut self) -> Result<()> {
        let mut layout = Vec::new();
        for root in self.roots.clone() {
            self.layout(root, &mut layout)?;
        }
        self.apply_layout(&layout)
    }

    /// Attached nodes whose declared size is stale.
    pub fn size_mismatches(&self) -> Result<Vec<SizeMismatch>> {
        let mut layout = Vec::new();
        for &root in &self.roots {
            self.layout(root, &mut layout)?;
        }
        let mut mismatches = Vec::new();
        for (id, node) in self.iter() {
            let Some(computed) = layout.get(id.0).copied().flatten() else {
                continue;
            };
            if node.declared != Some(computed) {
                mismatches.push(SizeMismatch {
                    node: id,
                    declared: node.declared_size(),
                    computed: computed.size(),
                });
            }
        }
        Ok(mismatches)
    }

    /// Record `new_size` (header and pad included) as the declared size of
    /// `id`, growing or shrinking every ancestor by the difference.
    ///
    /// Use after changing a node's content behind the tree's back; the
    /// payload setters call into the same propagation themselves.
    pub fn set_size(&mut self, id: NodeId, new_size: u64) -> Result<()> {
        let node = self.node(id)?;
        let header = RecordHeader::with_declared_size(self.convention, node.identifier, new_size)
            .map_err(|e| match (e, node.offset) {
                (Error::MalformedHeader { message, .. }, Some(offset)) => {
                    Error::malformed(offset, message)
                }
                (e, _) => e,
            })?;
        let old_size = node.declared_size().unwrap_or(0);
        let parent = node.parent;
        self.adjust_content(parent, i128::from(new_size) - i128::from(old_size))?;
        let node = self.node_mut(id)?;
        node.declared = Some(header.extent);
        node.open_ended = false;
        Ok(())
    }

    /// Whether `id` is the last record of its parent (or of the top level)
    /// with no trailing bytes after it. Detached nodes never are.
    pub(crate) fn ends_range(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        match node.parent {
            Some(parent) => self
                .get(parent)
                .is_some_and(|p| p.trailing.is_none() && p.children.last() == Some(&id)),
            None => self.trailing.is_none() && self.roots.last() == Some(&id),
        }
    }

    /// Re-derive `id`'s size from its content and position in its range.
    pub(crate) fn refresh(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let Some(old) = node.declared else {
            return Ok(());
        };
        let mut content = node.own_len();
        for &child in &node.children {
            content += self.node(child)?.declared_size().unwrap_or(0);
        }
        let new = frame(self.convention, node, content, self.ends_range(id))?;
        if new == old {
            return Ok(());
        }
        let parent = node.parent;
        self.adjust_content(parent, i128::from(new.size()) - i128::from(old.size()))?;
        let node = self.node_mut(id)?;
        node.declared = Some(new);
        node.open_ended = false;
        tracing::trace!("{} resized from {} to {} bytes", node.identifier, old.size(), new.size());
        Ok(())
    }

    /// Add `delta` to the content of `start` and re-frame every ancestor.
    ///
    /// The new extents are computed first and applied only if every level
    /// succeeds, so a failed propagation leaves the tree untouched.
    pub(crate) fn adjust_content(&mut self, start: Option<NodeId>, delta: i128) -> Result<()> {
        let mut plan = Vec::new();
        let mut current = start;
        let mut delta = delta;
        while let Some(id) = current {
            if delta == 0 {
                break;
            }
            let node = self.node(id)?;
            let Some(old) = node.declared else {
                break;
            };
            let content = u64::try_from(i128::from(old.content_len) + delta).map_err(|_| {
                Error::malformed(
                    node.offset.unwrap_or(0),
                    format!("{} content would shrink below zero", node.identifier),
                )
            })?;
            let new = frame(self.convention, node, content, self.ends_range(id))?;
            delta = i128::from(new.size()) - i128::from(old.size());
            plan.push((id, new));
            current = node.parent;
        }
        for (id, extent) in plan {
            let node = self.node_mut(id)?;
            node.declared = Some(extent);
            node.open_ended = false;
        }
        Ok(())
    }
}
