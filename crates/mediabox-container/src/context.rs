//! Per-record context handed to schemas during a parse.

use std::fmt;

use crate::{Convention, Identifier, ParseOptions};

/// Immutable, stack-linked list of the identifiers above a record.
///
/// Each recursive call extends its parent's ancestry with [`Ancestry::child`]
/// instead of mutating shared state, so parses never interfere.
#[derive(Clone, Copy)]
pub struct Ancestry<'a> {
    parent: Option<&'a Ancestry<'a>>,
    identifier: Option<&'a Identifier>,
    depth: usize,
}

impl<'a> Ancestry<'a> {
    /// Ancestry of a top-level record.
    pub const fn root() -> Self {
        Self {
            parent: None,
            identifier: None,
            depth: 0,
        }
    }

    /// Ancestry of a record nested in `identifier`.
    pub fn child(&'a self, identifier: &'a Identifier) -> Ancestry<'a> {
        Ancestry {
            parent: Some(self),
            identifier: Some(identifier),
            depth: self.depth + 1,
        }
    }

    /// Number of enclosing records.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Innermost enclosing identifier.
    pub fn parent_identifier(&self) -> Option<&Identifier> {
        self.identifier
    }

    /// Enclosing identifiers, outermost first.
    pub fn to_vec(&self) -> Vec<Identifier> {
        let mut path = Vec::with_capacity(self.depth);
        let mut node = Some(self);
        while let Some(current) = node {
            if let Some(id) = current.identifier {
                path.push(*id);
            }
            node = current.parent;
        }
        path.reverse();
        path
    }

    /// Dot-delimited path, e.g. `moov.trak`.
    pub fn to_path_string(&self) -> String {
        self.to_vec()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Debug for Ancestry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ancestry").field(&self.to_path_string()).finish()
    }
}

/// What a schema knows about the record it is decoding.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub(crate) convention: Convention,
    pub(crate) identifier: &'a Identifier,
    pub(crate) offset: u64,
    pub(crate) ancestry: &'a Ancestry<'a>,
    pub(crate) options: &'a ParseOptions,
}

impl<'a> ReadContext<'a> {
    /// Context for decoding a record outside a parse, e.g. in tests.
    pub fn new(
        convention: Convention,
        identifier: &'a Identifier,
        offset: u64,
        ancestry: &'a Ancestry<'a>,
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            convention,
            identifier,
            offset,
            ancestry,
            options,
        }
    }

    /// Header convention of the file.
    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Identifier of the record being decoded.
    pub fn identifier(&self) -> &Identifier {
        self.identifier
    }

    /// Absolute offset of the record header.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Enclosing records.
    pub fn ancestry(&self) -> &Ancestry<'a> {
        self.ancestry
    }

    /// Parse options, including pass-through `extra` entries.
    pub fn options(&self) -> &ParseOptions {
        self.options
    }
}
