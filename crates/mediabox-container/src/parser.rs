//! Parse entry point bundling a registry with options.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use crate::reader::read_tree;
use crate::source::ByteSource;
use crate::{Convention, ParseOptions, Registry, Result, Tree};

/// A registry plus parse options.
///
/// ```
/// use mediabox_container::Parser;
///
/// let bytes = b"\x00\x00\x00\x08free".to_vec();
/// let tree = Parser::iso_bmff().parse_bytes(bytes.clone()).unwrap();
/// assert_eq!(tree.roots().len(), 1);
/// assert_eq!(tree.to_bytes().unwrap(), bytes);
/// ```
#[derive(Debug, Clone)]
pub struct Parser {
    registry: Registry,
    options: ParseOptions,
}

impl Parser {
    /// Parser with default options.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            options: ParseOptions::default(),
        }
    }

    /// Built-in ISO-BMFF parser.
    pub fn iso_bmff() -> Self {
        Self::new(Registry::iso_bmff())
    }

    /// Built-in RIFF parser.
    pub fn riff() -> Self {
        Self::new(Registry::riff())
    }

    /// Built-in ASF parser.
    pub fn asf() -> Self {
        Self::new(Registry::asf())
    }

    /// Built-in parser for `convention`.
    pub fn for_convention(convention: Convention) -> Self {
        Self::new(Registry::for_convention(convention))
    }

    /// Replace the options.
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn convention(&self) -> Convention {
        self.registry.convention()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry access for adding leaf schemas.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse `source`. The tree keeps it to copy opaque records on write.
    pub fn parse<S: ByteSource + 'static>(&self, source: S) -> Result<Tree> {
        read_tree(Box::new(source), &self.registry, &self.options)
    }

    /// Parse an in-memory buffer.
    pub fn parse_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<Tree> {
        self.parse(Cursor::new(bytes.into()))
    }

    /// Open and parse a file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Tree> {
        let path = path.as_ref();
        tracing::debug!("Opening {:?}", path);
        let file = File::open(path)?;
        self.parse(BufReader::new(file))
    }
}
