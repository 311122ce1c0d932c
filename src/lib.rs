//! mediabox - read, edit and write ISO-BMFF, ASF and RIFF media containers
//!
//! This crate bundles the container core ([`container`]) with the bit-exact
//! tag codecs ([`bits`]) and adds file helpers that write edits back
//! atomically.
//!
//! # Example
//!
//! ```
//! use mediabox::{Convention, Identifier};
//!
//! let bytes = b"\x00\x00\x00\x10moov\x00\x00\x00\x08free".to_vec();
//! let mut tree = mediabox::parse_bytes(bytes, Convention::IsoBmff).unwrap();
//!
//! let moov = tree.container(tree.roots()[0]).unwrap();
//! let udta = tree.create_container(Identifier::fourcc(b"udta")).unwrap();
//! tree.append_child(moov, udta.node()).unwrap();
//!
//! assert_eq!(tree[moov.node()].declared_size(), Some(24));
//! assert_eq!(tree.to_bytes().unwrap().len(), 24);
//! ```

pub mod file;
pub mod id3;

pub use mediabox_bits as bits;
pub use mediabox_container as container;

pub use file::{open, open_with, parse_bytes, parser, save};
pub use mediabox_container::{
    Body, Convention, Error, FourCc, Guid, Identifier, Node, NodeId, ParseOptions, Parser,
    Payload, Registry, Result, Tree,
};
