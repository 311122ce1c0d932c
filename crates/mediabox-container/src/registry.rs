//! Identifier-to-schema registry.
//!
//! Leaf schemas plug into the core only through [`Registry::register`]:
//! each declares whether it is a container and decodes its own payload from
//! the bounded reader the core hands it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::payload::{Body, PrefixBytes};
use crate::source::RecordReader;
use crate::{Convention, Error, Identifier, ReadContext, Result};

/// Decoder for one record type.
pub trait RecordSchema: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether records of this type hold child records.
    fn is_container(&self) -> bool {
        false
    }

    /// Decode the payload.
    ///
    /// For leaves the reader covers the whole content; unread bytes are kept
    /// verbatim after the payload. For containers the schema reads only its
    /// fixed prefix and children are parsed from where it stopped.
    fn read(&self, input: &mut RecordReader<'_>, ctx: &ReadContext<'_>) -> Result<Body>;
}

/// Container whose content starts with a fixed-length prefix kept verbatim.
#[derive(Debug, Clone)]
pub struct ContainerSchema {
    name: String,
    prefix_len: u64,
}

impl ContainerSchema {
    /// Plain container: children start right after the header.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix_len: 0,
        }
    }

    /// Container with `prefix_len` bytes before the first child.
    pub fn with_prefix(name: impl Into<String>, prefix_len: u64) -> Self {
        Self {
            name: name.into(),
            prefix_len,
        }
    }
}

impl RecordSchema for ContainerSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_container(&self) -> bool {
        true
    }

    fn read(&self, input: &mut RecordReader<'_>, ctx: &ReadContext<'_>) -> Result<Body> {
        if self.prefix_len == 0 {
            return Ok(Body::Empty);
        }
        let prefix = input.read_bytes(self.prefix_len).map_err(|e| {
            Error::schema(&self.name, *ctx.identifier(), ctx.offset(), e.to_string())
        })?;
        Ok(Body::decoded(PrefixBytes(prefix)))
    }
}

type ReadFn = dyn Fn(&mut RecordReader<'_>, &ReadContext<'_>) -> Result<Body> + Send + Sync;

/// Leaf schema backed by a closure.
pub struct FnSchema {
    name: String,
    read: Box<ReadFn>,
}

impl FnSchema {
    /// Wrap `read` as a leaf schema.
    pub fn new<F>(name: impl Into<String>, read: F) -> Self
    where
        F: Fn(&mut RecordReader<'_>, &ReadContext<'_>) -> Result<Body> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            read: Box::new(read),
        }
    }
}

impl fmt::Debug for FnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema").field("name", &self.name).finish()
    }
}

impl RecordSchema for FnSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, input: &mut RecordReader<'_>, ctx: &ReadContext<'_>) -> Result<Body> {
        (self.read)(input, ctx)
    }
}

/// Outcome of a registry lookup.
#[derive(Clone, Copy)]
pub enum Resolved<'r> {
    /// A registered schema.
    Schema(&'r dyn RecordSchema),
    /// Nothing registered: keep (or drop) the record as opaque bytes.
    Opaque,
}

impl Resolved<'_> {
    /// Whether a schema was found.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

impl fmt::Debug for Resolved<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(schema) => f.debug_tuple("Schema").field(&schema.name()).finish(),
            Self::Opaque => f.write_str("Opaque"),
        }
    }
}

/// Schemas keyed by normalized identifier, for one convention.
#[derive(Clone)]
pub struct Registry {
    convention: Convention,
    schemas: HashMap<String, Arc<dyn RecordSchema>>,
}

impl Registry {
    /// Empty registry: every record resolves to opaque.
    pub fn new(convention: Convention) -> Self {
        Self {
            convention,
            schemas: HashMap::new(),
        }
    }

    /// Convention the keys are normalized for.
    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Register `schema` for `identifier`, replacing any previous entry.
    pub fn register(
        &mut self,
        identifier: impl Into<Identifier>,
        schema: impl RecordSchema + 'static,
    ) -> &mut Self {
        let key = identifier.into().key(self.convention);
        self.schemas.insert(key, Arc::new(schema));
        self
    }

    /// Register a plain container.
    pub fn register_container(&mut self, identifier: impl Into<Identifier>) -> &mut Self {
        let identifier = identifier.into();
        let name = identifier.to_string();
        self.register(identifier, ContainerSchema::new(name))
    }

    /// Register a leaf decoded by a closure.
    pub fn register_fn<F>(
        &mut self,
        identifier: impl Into<Identifier>,
        name: impl Into<String>,
        read: F,
    ) -> &mut Self
    where
        F: Fn(&mut RecordReader<'_>, &ReadContext<'_>) -> Result<Body> + Send + Sync + 'static,
    {
        self.register(identifier, FnSchema::new(name, read))
    }

    /// Remove the schema for `identifier`.
    pub fn unregister(&mut self, identifier: &Identifier) -> bool {
        self.schemas.remove(&identifier.key(self.convention)).is_some()
    }

    /// Look up the schema for `identifier`.
    pub fn resolve(&self, identifier: &Identifier) -> Resolved<'_> {
        match self.schemas.get(&identifier.key(self.convention)) {
            Some(schema) => Resolved::Schema(schema.as_ref()),
            None => Resolved::Opaque,
        }
    }

    /// Whether `identifier` resolves to a container schema.
    pub fn is_container(&self, identifier: &Identifier) -> bool {
        matches!(self.resolve(identifier), Resolved::Schema(s) if s.is_container())
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.schemas.keys().collect();
        keys.sort();
        f.debug_struct("Registry")
            .field("convention", &self.convention)
            .field("schemas", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ancestry, Guid, ParseOptions};
    use std::io::Cursor;

    #[test]
    fn test_unknown_resolves_opaque() {
        let registry = Registry::new(Convention::IsoBmff);
        assert!(!registry.resolve(&Identifier::fourcc(b"abcd")).is_known());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_is_case_insensitive_for_tags() {
        let mut registry = Registry::new(Convention::Riff);
        registry.register_container(Identifier::fourcc(b"LIST"));
        assert!(registry.is_container(&Identifier::fourcc(b"list")));
        assert!(registry.is_container(&Identifier::fourcc(b"LIST")));

        let mut registry = Registry::new(Convention::Riff);
        registry.register_container(Identifier::fourcc(b"AVI "));
        assert!(registry.is_container(&"avi".parse().unwrap()));
    }

    #[test]
    fn test_guid_lookup_is_exact() {
        let mut registry = Registry::new(Convention::Asf);
        let guid = Guid([0xAA; 16]);
        registry.register_container(guid);
        assert!(registry.is_container(&Identifier::Guid(guid)));
        assert!(!registry.resolve(&Identifier::Guid(Guid([0xAB; 16]))).is_known());
    }

    #[test]
    fn test_register_fn_and_unregister() {
        let mut registry = Registry::new(Convention::IsoBmff);
        registry.register_fn(Identifier::fourcc(b"name"), "name", |input, _ctx| {
            Ok(Body::raw(input.read_rest()?))
        });
        let id = Identifier::fourcc(b"name");
        assert_matches::assert_matches!(registry.resolve(&id), Resolved::Schema(s) if s.name() == "name");
        assert!(!registry.is_container(&id));
        assert!(registry.unregister(&id));
        assert!(!registry.resolve(&id).is_known());
    }

    #[test]
    fn test_container_prefix() {
        let schema = ContainerSchema::with_prefix("meta", 4);
        let id = Identifier::fourcc(b"meta");
        let options = ParseOptions::default();
        let ancestry = Ancestry::root();
        let ctx = ReadContext::new(Convention::IsoBmff, &id, 0, &ancestry, &options);

        let mut cursor = Cursor::new(vec![0, 0, 0, 0, 9, 9]);
        let mut input = RecordReader::new(&mut cursor, 8, 6);
        let body = schema.read(&mut input, &ctx).unwrap();
        assert_eq!(body.downcast_ref::<PrefixBytes>().unwrap().0, vec![0; 4]);
        assert_eq!(input.consumed(), 4);

        let mut cursor = Cursor::new(vec![0, 0]);
        let mut input = RecordReader::new(&mut cursor, 8, 2);
        assert!(schema.read(&mut input, &ctx).unwrap_err().is_schema_error());
    }
}
