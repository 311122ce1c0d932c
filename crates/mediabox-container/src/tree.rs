//! Arena-backed record tree.
//!
//! Nodes live in one `Vec` owned by the [`Tree`]; parents and children refer
//! to each other by [`NodeId`]. The tree also owns the byte source it was read
//! from, so opaque records can stay on disk until they are written.

use std::cell::RefCell;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Index;

use crate::header::{validate_identifier, Extent};
use crate::payload::{Body, Payload};
use crate::source::{ByteSource, OpaqueBody};
use crate::{Convention, Error, Identifier, Result};

/// Handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena slot of the node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a node known to be a container.
///
/// Only [`Tree::container`] hands these out, so child operations cannot be
/// called on a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(NodeId);

impl ContainerId {
    /// The underlying node.
    pub fn node(self) -> NodeId {
        self.0
    }
}

impl From<ContainerId> for NodeId {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// One record.
#[derive(Debug)]
pub struct Node {
    pub(crate) identifier: Identifier,
    pub(crate) is_container: bool,
    pub(crate) expanded: bool,
    pub(crate) offset: Option<u64>,
    pub(crate) declared: Option<Extent>,
    pub(crate) open_ended: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) body: Body,
    pub(crate) trailing: Option<OpaqueBody>,
}

impl Node {
    pub(crate) fn new(identifier: Identifier, is_container: bool, body: Body) -> Self {
        Self {
            identifier,
            is_container,
            expanded: is_container,
            offset: None,
            declared: None,
            open_ended: false,
            parent: None,
            children: Vec::new(),
            body,
            trailing: None,
        }
    }

    /// Record type.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Whether the record's schema is a container.
    pub fn is_container(&self) -> bool {
        self.is_container
    }

    /// False for containers kept as opaque bytes (filtered out, or recovered
    /// after a schema failure).
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Absolute header offset in the source; `None` for nodes built in memory.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Declared layout; `None` until the node is first attached.
    pub fn extent(&self) -> Option<Extent> {
        self.declared
    }

    /// Declared size, header (and RIFF pad) included.
    pub fn declared_size(&self) -> Option<u64> {
        self.declared.map(|extent| extent.size())
    }

    /// Header length of the declared layout.
    pub fn header_len(&self) -> Option<u64> {
        self.declared.map(|extent| extent.header_len)
    }

    /// Whether the record was read with ISO-BMFF size 0.
    pub fn is_open_ended(&self) -> bool {
        self.open_ended
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order. Empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The decoded payload as `T`.
    pub fn payload<T: Payload>(&self) -> Option<&T> {
        self.body.downcast_ref()
    }

    /// Bytes after the payload and children that nothing decoded.
    pub fn trailing(&self) -> Option<&OpaqueBody> {
        self.trailing.as_ref()
    }

    /// Content bytes this node contributes itself (payload and trailing).
    pub(crate) fn own_len(&self) -> u64 {
        self.body.len() + self.trailing.as_ref().map_or(0, OpaqueBody::len)
    }
}

/// A parsed or constructed record tree.
pub struct Tree {
    pub(crate) convention: Convention,
    pub(crate) nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) trailing: Option<OpaqueBody>,
    pub(crate) source: Option<RefCell<Box<dyn ByteSource>>>,
}

impl Tree {
    /// Empty tree with no backing source.
    pub fn new(convention: Convention) -> Self {
        Self {
            convention,
            nodes: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            trailing: None,
            source: None,
        }
    }

    /// Header convention of every record in the tree.
    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Top-level records in document order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Bytes after the last top-level record too short to be one.
    pub fn trailing(&self) -> Option<&OpaqueBody> {
        self.trailing.as_ref()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Look up a node, failing with [`Error::UnknownNode`].
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or(Error::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownNode(id))
    }

    /// Check that `id` is a container.
    pub fn container(&self, id: NodeId) -> Result<ContainerId> {
        let node = self.node(id)?;
        if node.is_container {
            Ok(ContainerId(id))
        } else {
            Err(Error::NotAContainer(node.identifier))
        }
    }

    /// Children of a container in document order.
    pub fn children(&self, id: ContainerId) -> &[NodeId] {
        self.get(id.0).map_or(&[], |node| node.children.as_slice())
    }

    /// First child with a matching identifier.
    pub fn child(&self, id: ContainerId, identifier: &Identifier) -> Option<NodeId> {
        self.children_with(id, identifier).next()
    }

    /// Every child with a matching identifier, in document order.
    pub fn children_with<'t>(
        &'t self,
        id: ContainerId,
        identifier: &'t Identifier,
    ) -> impl Iterator<Item = NodeId> + 't {
        self.children(id).iter().copied().filter(move |&child| {
            self.get(child)
                .is_some_and(|node| node.identifier.matches(identifier, self.convention))
        })
    }

    /// Every node reached by a dot-delimited identifier path from the roots,
    /// e.g. `moov.trak.tkhd`.
    pub fn find_all(&self, path: &str) -> Vec<NodeId> {
        let mut current: Vec<NodeId> = Vec::new();
        for (depth, segment) in path.split('.').enumerate() {
            let Ok(identifier) = segment.parse::<Identifier>() else {
                return Vec::new();
            };
            let candidates: Vec<NodeId> = if depth == 0 {
                self.roots.clone()
            } else {
                current
                    .iter()
                    .filter_map(|&id| self.get(id))
                    .flat_map(|node| node.children.iter().copied())
                    .collect()
            };
            current = candidates
                .into_iter()
                .filter(|&id| {
                    self.get(id)
                        .is_some_and(|node| node.identifier.matches(&identifier, self.convention))
                })
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// First node reached by `path`, in document order.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.find_all(path).into_iter().next()
    }

    /// `id` and everything below it, depth first in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Every attached node, depth first in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.roots
            .iter()
            .flat_map(|&root| self.descendants(root))
            .filter_map(|id| self.get(id).map(|node| (id, node)))
    }

    /// Identifiers from the top level down to `id`, joined with dots.
    pub fn path_of(&self, id: NodeId) -> Result<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            segments.push(node.identifier.to_string());
            current = node.parent;
        }
        segments.reverse();
        Ok(segments.join("."))
    }

    /// Whether `id` hangs off one of the roots.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            match self.get(current) {
                Some(node) => match node.parent {
                    Some(parent) => current = parent,
                    None => return self.roots.contains(&current),
                },
                None => return false,
            }
        }
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Create a detached leaf.
    pub fn create_leaf(&mut self, identifier: impl Into<Identifier>, body: Body) -> Result<NodeId> {
        let identifier = identifier.into();
        validate_identifier(self.convention, &identifier)?;
        Ok(self.alloc(Node::new(identifier, false, body)))
    }

    /// Create a detached, empty container.
    pub fn create_container(&mut self, identifier: impl Into<Identifier>) -> Result<ContainerId> {
        let identifier = identifier.into();
        validate_identifier(self.convention, &identifier)?;
        Ok(ContainerId(self.alloc(Node::new(identifier, true, Body::Empty))))
    }

    /// Create a detached leaf holding `bytes` verbatim.
    pub fn create_raw(&mut self, identifier: impl Into<Identifier>, bytes: Vec<u8>) -> Result<NodeId> {
        self.create_leaf(identifier, Body::raw(bytes))
    }

    /// Append `child` to `parent`, sealing its sizes and growing every
    /// ancestor.
    pub fn append_child(&mut self, parent: ContainerId, child: NodeId) -> Result<()> {
        let index = self.node(parent.0)?.children.len();
        self.attach(Some(parent), index, child)
    }

    /// Insert `child` at `index` among `parent`'s children.
    pub fn insert_child(&mut self, parent: ContainerId, index: usize, child: NodeId) -> Result<()> {
        self.attach(Some(parent), index, child)
    }

    /// Append `child` to the top level.
    pub fn push_root(&mut self, child: NodeId) -> Result<()> {
        let index = self.roots.len();
        self.attach(None, index, child)
    }

    /// Insert `child` at `index` in the top level.
    pub fn insert_root(&mut self, index: usize, child: NodeId) -> Result<()> {
        self.attach(None, index, child)
    }

    fn attach(&mut self, parent: Option<ContainerId>, index: usize, child: NodeId) -> Result<()> {
        let node = self.node(child)?;
        if node.parent.is_some() || self.roots.contains(&child) {
            return Err(Error::AlreadyAttached(child));
        }

        let len = match parent {
            Some(parent) => {
                let parent_node = self.node(parent.0)?;
                if !parent_node.is_container {
                    return Err(Error::NotAContainer(parent_node.identifier));
                }
                let mut current = Some(parent.0);
                while let Some(id) = current {
                    if id == child {
                        return Err(Error::WouldCycle(child));
                    }
                    current = self.node(id)?.parent;
                }
                parent_node.children.len()
            }
            None => self.roots.len(),
        };
        if index > len {
            return Err(Error::IndexOutOfBounds { index, len });
        }

        let extent = self.seal(child)?;
        let previous_last = match parent {
            Some(parent) => self.node(parent.0)?.children.last().copied(),
            None => self.roots.last().copied(),
        };
        match parent {
            Some(parent) => {
                self.adjust_content(Some(parent.0), i128::from(extent.size()))?;
                self.node_mut(parent.0)?.children.insert(index, child);
                self.node_mut(child)?.parent = Some(parent.0);
            }
            None => self.roots.insert(index, child),
        }
        // A chunk that ended its range without a pad byte needs one now.
        if let Some(previous) = previous_last.filter(|_| index == len) {
            self.refresh(previous)?;
        }
        tracing::debug!(
            "Attached {} ({} bytes) at index {}",
            self.node(child)?.identifier,
            extent.size(),
            index
        );
        Ok(())
    }

    /// Unlink `id` from its parent (or the top level), shrinking every
    /// ancestor. The subtree stays in the arena and can be attached again.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let size = node.declared_size().unwrap_or(0);
        match node.parent {
            Some(parent) => {
                self.adjust_content(Some(parent), -i128::from(size))?;
                self.node_mut(parent)?.children.retain(|&c| c != id);
                self.node_mut(id)?.parent = None;
            }
            None => self.roots.retain(|&r| r != id),
        }
        Ok(())
    }

    /// Detach `id` and free its whole subtree. Its ids become invalid.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    /// Release the arena slots of `id` and everything below it, without
    /// touching any ancestor's links or sizes.
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(current.0);
            }
        }
    }

    /// Replace the payload, returning the old one. Sizes follow.
    pub fn set_body(&mut self, id: NodeId, body: Body) -> Result<Body> {
        let old = std::mem::replace(&mut self.node_mut(id)?.body, body);
        self.refresh(id)?;
        Ok(old)
    }

    /// Replace the payload with in-memory bytes.
    pub fn set_raw_bytes(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<Body> {
        self.set_body(id, Body::raw(bytes))
    }

    /// Replace (or clear) the bytes kept after the payload and children.
    pub fn set_trailing(&mut self, id: NodeId, bytes: Option<Vec<u8>>) -> Result<()> {
        self.node_mut(id)?.trailing = bytes.map(OpaqueBody::Owned);
        if let Some(&last) = self.node(id)?.children.last() {
            self.refresh(last)?;
        }
        self.refresh(id)
    }

    /// Edit the decoded payload in place. Returns `None` when the payload is
    /// not a `T`.
    pub fn update_payload<T, R, F>(&mut self, id: NodeId, f: F) -> Result<Option<R>>
    where
        T: Payload,
        F: FnOnce(&mut T) -> R,
    {
        let Some(payload) = self.node_mut(id)?.body.downcast_mut::<T>() else {
            return Ok(None);
        };
        let result = f(payload);
        self.refresh(id)?;
        Ok(Some(result))
    }

    /// Read an opaque body into memory.
    pub fn read_opaque(&self, body: &OpaqueBody) -> Result<Vec<u8>> {
        match body {
            OpaqueBody::Owned(bytes) => Ok(bytes.clone()),
            OpaqueBody::Deferred { offset, len } => {
                let mut source = self.source()?.borrow_mut();
                source.seek(SeekFrom::Start(*offset))?;
                let mut buf = Vec::with_capacity(*len as usize);
                let read = (&mut **source).take(*len).read_to_end(&mut buf)? as u64;
                if read != *len {
                    return Err(Error::TruncatedStream {
                        offset: *offset,
                        need: *len,
                        have: read,
                    });
                }
                Ok(buf)
            }
        }
    }

    /// Raw bytes of an opaque node's payload.
    pub fn raw_bytes(&self, id: NodeId) -> Result<Option<Vec<u8>>> {
        match &self.node(id)?.body {
            Body::Raw(opaque) => self.read_opaque(opaque).map(Some),
            _ => Ok(None),
        }
    }

    /// Load every deferred body into memory and release the source, e.g.
    /// before writing back over the file the tree was read from.
    pub fn materialize(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Ok(());
        }
        for slot in 0..self.nodes.len() {
            let Some(node) = &self.nodes[slot] else {
                continue;
            };
            let body = match &node.body {
                Body::Raw(opaque @ OpaqueBody::Deferred { .. }) => Some(self.read_opaque(opaque)?),
                _ => None,
            };
            let trailing = match &node.trailing {
                Some(opaque @ OpaqueBody::Deferred { .. }) => Some(self.read_opaque(opaque)?),
                _ => None,
            };
            if let Some(node) = self.nodes[slot].as_mut() {
                if let Some(bytes) = body {
                    node.body = Body::raw(bytes);
                }
                if let Some(bytes) = trailing {
                    node.trailing = Some(OpaqueBody::Owned(bytes));
                }
            }
        }
        let trailing = match &self.trailing {
            Some(opaque @ OpaqueBody::Deferred { .. }) => Some(self.read_opaque(opaque)?),
            _ => None,
        };
        if let Some(bytes) = trailing {
            self.trailing = Some(OpaqueBody::Owned(bytes));
        }
        self.source = None;
        Ok(())
    }

    pub(crate) fn source(&self) -> Result<&RefCell<Box<dyn ByteSource>>> {
        self.source.as_ref().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "tree has no byte source for deferred records",
            ))
        })
    }

    /// Indented listing of the tree, one record per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for (id, node) in self.iter() {
            let depth = self.depth(id);
            let size = node
                .declared_size()
                .map_or_else(|| "?".to_string(), |size| size.to_string());
            out.push_str(&format!("{:indent$}{} [{}]", "", node.identifier, size, indent = depth * 2));
            if node.body.is_raw() {
                out.push_str(" raw");
            }
            out.push('\n');
        }
        out
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(|node| node.parent);
        }
        depth
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("unknown node {id:?}"),
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("convention", &self.convention)
            .field("nodes", &self.len())
            .field("roots", &self.roots)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
