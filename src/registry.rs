use crate::boxes::{Body, BoxHeader, BoxKey};
use crate::error::Result;
use crate::parser::TreeBuilder;
use std::collections::HashMap;

/// Trait for box decoders.
///
/// A decoder is handed the tree builder with the reader on the first payload
/// byte and the read window limited to the box, and returns the decoded
/// [`Body`]. Plain functions with the matching signature implement it.
pub trait BoxDecoder: Send + Sync {
    fn decode(&self, tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body>;
}

impl<F> BoxDecoder for F
where
    F: Fn(&mut TreeBuilder<'_>, &BoxHeader) -> Result<Body> + Send + Sync,
{
    fn decode(&self, tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
        self(tb, hdr)
    }
}

/// Where a box sits, which decides the registry priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// File level and ordinary containers: standard first, then vendor.
    Generic,
    /// Inside `stsd` and sample entries: vendor first, then standard.
    SampleEntry,
}

/// Registry of decoders keyed by `BoxKey` (4CC or UUID).
///
/// The registry is immutable once constructed; use [`Registry::with_decoder`]
/// to build it fluently.
pub struct Registry {
    map: HashMap<BoxKey, RegistryEntry>,
}

pub struct RegistryEntry {
    inner: Box<dyn BoxDecoder>,
    name: &'static str,
}

impl RegistryEntry {
    /// Human-readable box name, e.g. "Movie Header Box".
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn decode(&self, tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
        self.inner.decode(tb, hdr)
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Return a new registry with the given decoder added.
    pub fn with_decoder(
        mut self,
        key: impl Into<BoxKey>,
        name: &'static str,
        dec: impl BoxDecoder + 'static,
    ) -> Self {
        self.map.insert(
            key.into(),
            RegistryEntry {
                inner: Box::new(dec),
                name,
            },
        );
        self
    }

    pub fn get(&self, key: &BoxKey) -> Option<&RegistryEntry> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &BoxKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The two registries a decode pass consults, in scope-dependent order.
/// Keys found in neither become opaque boxes.
pub struct BoxFactory {
    standard: Registry,
    vendor: Registry,
}

impl BoxFactory {
    pub fn new(standard: Registry, vendor: Registry) -> Self {
        Self { standard, vendor }
    }

    pub fn standard(&self) -> &Registry {
        &self.standard
    }

    pub fn vendor(&self) -> &Registry {
        &self.vendor
    }

    pub fn lookup(&self, scope: Scope, key: &BoxKey) -> Option<&RegistryEntry> {
        let (first, second) = match scope {
            Scope::Generic => (&self.standard, &self.vendor),
            Scope::SampleEntry => (&self.vendor, &self.standard),
        };
        first.get(key).or_else(|| second.get(key))
    }
}

impl Default for BoxFactory {
    fn default() -> Self {
        Self::new(
            crate::decoders::iso::standard_registry(),
            crate::decoders::vendor::vendor_registry(),
        )
    }
}
