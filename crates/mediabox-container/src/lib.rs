//! mediabox-container: recursive codec for length-prefixed media containers
//!
//! Reads ISO-BMFF boxes, ASF objects and RIFF chunks into an editable tree,
//! keeps every size consistent through mutation, and writes the tree back
//! byte-for-byte when nothing changed.
//!
//! # Modules
//!
//! - `header` - Record header codec for the three conventions
//! - `registry` - Identifier-to-schema lookup, the extension point for leaf
//!   decoders
//! - `tree` - Arena tree of records with mutation helpers
//! - `size` - Bottom-up size computation and delta propagation
//! - `schemas` - Built-in container schemas per format
//!
//! # Example
//!
//! ```
//! use mediabox_container::{schemas::riff::InfoText, Body, Parser};
//!
//! let bytes = b"LIST\x10\x00\x00\x00INFOINAM\x04\x00\x00\x00Test".to_vec();
//! let mut tree = Parser::riff().parse_bytes(bytes).unwrap();
//!
//! let inam = tree.find("LIST.INAM").unwrap();
//! assert_eq!(tree[inam].payload::<InfoText>().unwrap().text(), "Test");
//!
//! tree.set_body(inam, Body::decoded(InfoText::new("Longer"))).unwrap();
//! let list = tree.roots()[0];
//! assert_eq!(tree[list].declared_size(), Some(26));
//! ```

pub mod context;
pub mod convention;
pub mod error;
pub mod header;
pub mod identifier;
pub mod options;
pub mod parser;
pub mod payload;
mod reader;
pub mod registry;
pub mod schemas;
pub mod size;
pub mod source;
pub mod tree;
mod writer;

pub use context::{Ancestry, ReadContext};
pub use convention::Convention;
pub use error::{Error, Result};
pub use header::{decode_header, encode_header, Extent, RecordHeader};
pub use identifier::{FourCc, Guid, Identifier};
pub use options::{LeafErrorPolicy, ParseOptions, ParseOptionsBuilder, PathFilter, UnknownPolicy};
pub use parser::Parser;
pub use payload::{Body, Payload, PrefixBytes, WriteContext};
pub use registry::{ContainerSchema, FnSchema, RecordSchema, Registry, Resolved};
pub use size::SizeMismatch;
pub use source::{ByteSource, OpaqueBody, RecordReader};
pub use tree::{ContainerId, Node, NodeId, Tree};
