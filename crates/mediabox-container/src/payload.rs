//! Record payloads: what a schema decodes and how it writes back.

use std::any::Any;
use std::fmt;
use std::io::{self, Write};

use crate::source::OpaqueBody;

/// Facts about a container's children a payload may need while writing,
/// e.g. an ASF header object's child count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteContext {
    /// Number of direct children.
    pub child_count: usize,
    /// Bytes written after the payload: every child plus any bytes kept
    /// after the last child.
    pub children_len: u64,
}

/// Decoded payload of a record, owned by the schema that produced it.
///
/// For containers this is the fixed prefix that precedes the children
/// (a RIFF `LIST` form type, an ISO full-box version/flags word).
pub trait Payload: fmt::Debug + Any {
    /// Bytes [`write_to`](Payload::write_to) emits.
    fn encoded_len(&self) -> u64;

    /// Serialize the payload.
    fn write_to(&self, out: &mut dyn Write, ctx: &WriteContext) -> io::Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Payload {
    /// Downcast to a concrete payload type.
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Downcast to a concrete payload type, mutably.
    pub fn downcast_mut<T: Payload>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Payload of a record node.
#[derive(Debug)]
pub enum Body {
    /// Nothing (plain containers, empty leaves).
    Empty,
    /// Uninterpreted bytes: unknown records, filtered-out subtrees,
    /// leaves that failed to decode under the recover policy.
    Raw(OpaqueBody),
    /// Produced by a registered schema.
    Decoded(Box<dyn Payload>),
}

impl Body {
    /// Wrap a decoded payload.
    pub fn decoded(payload: impl Payload) -> Self {
        Self::Decoded(Box::new(payload))
    }

    /// In-memory raw bytes.
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self::Raw(OpaqueBody::Owned(bytes))
    }

    /// Serialized length.
    pub fn len(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Raw(opaque) => opaque.len(),
            Self::Decoded(payload) => payload.encoded_len(),
        }
    }

    /// Whether the body serializes to nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this is an opaque body.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// The decoded payload as `T`, if it is one.
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        match self {
            Self::Decoded(payload) => payload.downcast_ref(),
            _ => None,
        }
    }

    /// The decoded payload as `T`, mutably.
    pub fn downcast_mut<T: Payload>(&mut self) -> Option<&mut T> {
        match self {
            Self::Decoded(payload) => payload.downcast_mut(),
            _ => None,
        }
    }
}

/// Fixed-length prefix kept verbatim (e.g. full-box version and flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixBytes(pub Vec<u8>);

impl Payload for PrefixBytes {
    fn encoded_len(&self) -> u64 {
        self.0.len() as u64
    }

    fn write_to(&self, out: &mut dyn Write, _ctx: &WriteContext) -> io::Result<()> {
        out.write_all(&self.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_len() {
        assert_eq!(Body::Empty.len(), 0);
        assert_eq!(Body::raw(vec![1, 2, 3]).len(), 3);
        assert_eq!(
            Body::Raw(OpaqueBody::Deferred {
                offset: 10,
                len: 1 << 40
            })
            .len(),
            1 << 40
        );
        assert_eq!(Body::decoded(PrefixBytes(vec![0; 4])).len(), 4);
    }

    #[test]
    fn test_body_downcast() {
        let mut body = Body::decoded(PrefixBytes(vec![1, 0, 0, 0]));
        assert_eq!(body.downcast_ref::<PrefixBytes>().unwrap().0[0], 1);
        body.downcast_mut::<PrefixBytes>().unwrap().0[0] = 2;
        assert_eq!(body.downcast_ref::<PrefixBytes>().unwrap().0[0], 2);
        assert!(Body::raw(vec![]).downcast_ref::<PrefixBytes>().is_none());
    }
}
