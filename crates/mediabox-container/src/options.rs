//! Parse configuration.

use std::collections::BTreeMap;

use crate::{Convention, Identifier};

/// Default limit on record nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What to do with records no schema is registered for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnknownPolicy {
    /// Keep the raw bytes as an opaque record so the tree round-trips.
    #[default]
    Preserve,
    /// Skip the record and log a warning. Lossy; matches how older RIFF
    /// readers treat chunks they do not know.
    Drop,
}

/// What to do when a registered schema fails to decode its payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LeafErrorPolicy {
    /// Fail the parse with [`Error::Schema`](crate::Error::Schema).
    #[default]
    Abort,
    /// Keep the record as opaque bytes and continue with its siblings.
    /// A container whose children are malformed is kept whole, unexpanded.
    Recover,
}

/// Dot-delimited ancestor path selecting which ISO-BMFF subtrees to expand,
/// e.g. `moov.trak.mdia`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathFilter {
    segments: Vec<String>,
}

impl PathFilter {
    /// Parse a dot-delimited path. Empty segments are ignored.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Path segments, lowercased.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether a container reached through `path` should be expanded.
    ///
    /// True while `path` is still on the way to the filter target, and for
    /// everything below the target.
    pub fn allows(&self, path: &[Identifier], convention: Convention) -> bool {
        path.iter()
            .zip(&self.segments)
            .all(|(id, segment)| id.key(convention) == *segment)
    }
}

/// Configuration for a parse.
///
/// ```
/// use mediabox_container::{ParseOptions, UnknownPolicy};
///
/// let options = ParseOptions::builder()
///     .path_filter("moov.trak")
///     .unknown_policy(UnknownPolicy::Preserve)
///     .extra("encoding", "utf-8")
///     .build();
/// assert_eq!(options.extra("encoding"), Some("utf-8"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOptions {
    /// ISO-BMFF ancestor path filter. Ignored for other conventions.
    pub path_filter: Option<PathFilter>,

    /// Handling of records without a schema.
    /// Default: Preserve
    pub unknown_policy: UnknownPolicy,

    /// Handling of schema failures.
    /// Default: Abort
    pub leaf_errors: LeafErrorPolicy,

    /// Deepest allowed nesting.
    /// Default: 64
    pub max_depth: usize,

    /// Options passed through to schemas untouched (target encoding,
    /// read-only flag, ...).
    pub extra: BTreeMap<String, String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            path_filter: None,
            unknown_policy: UnknownPolicy::default(),
            leaf_errors: LeafErrorPolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            extra: BTreeMap::new(),
        }
    }
}

impl ParseOptions {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder.
    pub fn builder() -> ParseOptionsBuilder {
        ParseOptionsBuilder::default()
    }

    /// Look up a pass-through option.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// Builder for `ParseOptions`.
#[derive(Debug, Clone, Default)]
pub struct ParseOptionsBuilder {
    path_filter: Option<PathFilter>,
    unknown_policy: Option<UnknownPolicy>,
    leaf_errors: Option<LeafErrorPolicy>,
    max_depth: Option<usize>,
    extra: BTreeMap<String, String>,
}

impl ParseOptionsBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only expand ISO-BMFF containers on the way to, or below, `path`.
    pub fn path_filter(mut self, path: &str) -> Self {
        self.path_filter = Some(PathFilter::new(path));
        self
    }

    /// Set the unknown-record policy.
    pub fn unknown_policy(mut self, policy: UnknownPolicy) -> Self {
        self.unknown_policy = Some(policy);
        self
    }

    /// Set the schema failure policy.
    pub fn leaf_errors(mut self, policy: LeafErrorPolicy) -> Self {
        self.leaf_errors = Some(policy);
        self
    }

    /// Set the nesting limit.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Add a pass-through option for schemas.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ParseOptions {
        ParseOptions {
            path_filter: self.path_filter,
            unknown_policy: self.unknown_policy.unwrap_or_default(),
            leaf_errors: self.leaf_errors.unwrap_or_default(),
            max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            extra: self.extra,
        }
    }
}
