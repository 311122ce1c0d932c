//! Error types for mediabox-container.

use std::io;
use thiserror::Error;

use crate::{Convention, Identifier, NodeId};

/// Result type for mediabox-container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mediabox-container operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header declares an impossible size, or a child overflows its parent.
    #[error("Malformed header at offset {offset}: {message}")]
    MalformedHeader { offset: u64, message: String },

    /// Record needs bytes past the end of the backing store.
    #[error("Truncated stream at offset {offset}: need {need} bytes, have {have}")]
    TruncatedStream { offset: u64, need: u64, have: u64 },

    /// Declared size is smaller than the header it must contain.
    #[error("Declared size {size} is smaller than the {min}-byte header")]
    HeaderTooSmall { size: u64, min: u64 },

    /// Child operation on a record whose schema is not a container.
    #[error("Record {0} is not a container")]
    NotAContainer(Identifier),

    /// Identifier longer than the convention can encode.
    #[error("Identifier {identifier} is too long for {convention}")]
    IdentifierTooLong {
        convention: Convention,
        identifier: Identifier,
    },

    /// Identifier kind the convention cannot encode at all.
    #[error("Identifier {identifier} is not valid for {convention}")]
    UnsupportedIdentifier {
        convention: Convention,
        identifier: Identifier,
    },

    /// Identifier text could not be parsed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Content length does not fit the convention's size field.
    #[error("Size {size} exceeds the {convention} maximum of {max}")]
    SizeOverflow {
        convention: Convention,
        size: u64,
        max: u64,
    },

    /// Records nest deeper than the configured limit.
    #[error("Nesting depth {depth} exceeds limit at offset {offset}")]
    NestingTooDeep { depth: usize, offset: u64 },

    /// A registered schema failed to decode its payload.
    #[error("Schema {schema} failed for {identifier} at offset {offset}: {message}")]
    Schema {
        schema: String,
        identifier: Identifier,
        offset: u64,
        message: String,
    },

    /// Node id does not refer to a live node.
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),

    /// Node is already part of the tree.
    #[error("Node {0:?} is already attached")]
    AlreadyAttached(NodeId),

    /// Attaching would make a node its own ancestor.
    #[error("Node {0:?} cannot be attached below itself")]
    WouldCycle(NodeId),

    /// Child position past the end of the child list.
    #[error("Index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl Error {
    /// Create a malformed header error.
    pub fn malformed(offset: u64, msg: impl Into<String>) -> Self {
        Self::MalformedHeader {
            offset,
            message: msg.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(
        schema: impl Into<String>,
        identifier: Identifier,
        offset: u64,
        msg: impl Into<String>,
    ) -> Self {
        Self::Schema {
            schema: schema.into(),
            identifier,
            offset,
            message: msg.into(),
        }
    }

    /// Whether the error came from a leaf schema rather than the framing.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Whether the bytes of one record are bad, so that record can be kept
    /// opaque while its siblings are still read.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::MalformedHeader { .. } | Self::TruncatedStream { .. }
        )
    }
}
