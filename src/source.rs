//! Definition sources
//!
//! Sources are queried in priority order and the first hit wins. Two things
//! cross source boundaries: object definitions accumulate method and
//! property injections declared for the same class further down the chain,
//! and decorators capture the definition found below them.
//!
//! Uses DashMap with ahash, like the rest of the container's storage.

use crate::definition::{Definition, ObjectDefinition};
use crate::reflection::ClassRegistry;
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Something that can produce definitions by identifier
pub trait DefinitionSource: Send + Sync {
    /// Definition for `id`, if this source knows it
    fn get_definition(&self, id: &str) -> Option<Definition>;

    /// All identifiers this source can answer for
    fn definition_names(&self) -> Vec<String>;
}

// =============================================================================
// Explicit definitions
// =============================================================================

/// Explicitly configured definitions
///
/// Filled from builder calls or by a loader that turns configuration files
/// into [`Definition`]s.
#[derive(Default)]
pub struct DefinitionMap {
    definitions: DashMap<String, Definition, RandomState>,
}

impl DefinitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition, replacing any previous one with the same id
    #[inline]
    pub fn insert(&self, definition: impl Into<Definition>) {
        let definition = definition.into();
        self.definitions
            .insert(definition.id().to_string(), definition);
    }

    /// Chainable variant of [`insert`](Self::insert)
    pub fn with(self, definition: impl Into<Definition>) -> Self {
        self.insert(definition);
        self
    }

    #[inline]
    pub fn remove(&self, id: &str) -> bool {
        self.definitions.remove(id).is_some()
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionSource for DefinitionMap {
    fn get_definition(&self, id: &str) -> Option<Definition> {
        self.definitions.get(id).map(|entry| entry.value().clone())
    }

    fn definition_names(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl fmt::Debug for DefinitionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefinitionMap")
            .field("count", &self.len())
            .finish()
    }
}

impl<T: DefinitionSource + ?Sized> DefinitionSource for Arc<T> {
    fn get_definition(&self, id: &str) -> Option<Definition> {
        (**self).get_definition(id)
    }

    fn definition_names(&self) -> Vec<String> {
        (**self).definition_names()
    }
}

// =============================================================================
// Reflection-derived definitions
// =============================================================================

/// Derives object definitions from registered classes.
///
/// The produced definition binds the constructor purely by autowiring and
/// carries the injections declared by the class's attributes.
#[derive(Debug, Clone)]
pub struct AutowireSource {
    classes: Arc<ClassRegistry>,
    enabled: bool,
}

impl AutowireSource {
    pub fn new(classes: Arc<ClassRegistry>, enabled: bool) -> Self {
        Self { classes, enabled }
    }

    /// Attribute-declared injections for `class`, regardless of `enabled`
    pub fn fragment(&self, class: &str) -> Option<ObjectDefinition> {
        let descriptor = self.classes.get(class)?;
        let mut definition = ObjectDefinition::autowire(class);
        definition.method_injections = descriptor.method_injections().to_vec();
        definition.property_injections = descriptor.property_injections().clone();
        Some(definition)
    }
}

impl DefinitionSource for AutowireSource {
    fn get_definition(&self, id: &str) -> Option<Definition> {
        if !self.enabled {
            return None;
        }
        self.fragment(id).map(Definition::Object)
    }

    fn definition_names(&self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        self.classes.names()
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Where environment definitions read their variables from
pub trait EnvironmentReader: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentReader for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: HashMap<String, String, RandomState>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvironmentReader for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Ordered set of sources, most specific first, autowiring last
pub struct SourceChain {
    sources: Vec<Arc<dyn DefinitionSource>>,
    autowire: AutowireSource,
}

impl SourceChain {
    /// `sources` must be ordered from highest to lowest priority
    pub fn new(sources: Vec<Arc<dyn DefinitionSource>>, autowire: AutowireSource) -> Self {
        Self { sources, autowire }
    }

    /// Effective definition for `id`
    pub fn lookup(&self, id: &str) -> Option<Definition> {
        self.lookup_from(0, id)
    }

    fn lookup_from(&self, start: usize, id: &str) -> Option<Definition> {
        for (offset, source) in self.sources.iter().enumerate().skip(start) {
            if let Some(definition) = source.get_definition(id) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "autowire",
                    id = id,
                    source = offset,
                    kind = definition.kind_name(),
                    "Definition found"
                );
                return Some(self.complete(offset + 1, definition));
            }
        }

        // The autowire definition already carries its class's attribute injections.
        self.autowire.get_definition(id)
    }

    /// Merge what lower-priority sources contribute to a winning definition
    fn complete(&self, next: usize, definition: Definition) -> Definition {
        match definition {
            Definition::Object(mut object) => {
                for source in self.sources.iter().skip(next) {
                    if let Some(Definition::Object(lower)) =
                        source.get_definition(&object.class_name)
                    {
                        if lower.class_name == object.class_name {
                            object.accumulate(&lower.method_injections, &lower.property_injections);
                        }
                    }
                }
                if let Some(fragment) = self.autowire.fragment(&object.class_name) {
                    object.accumulate(&fragment.method_injections, &fragment.property_injections);
                }
                Definition::Object(object)
            }
            Definition::Decorator(mut decorator) if decorator.inner.is_none() => {
                decorator.inner = self.lookup_from(next, &decorator.id).map(Box::new);
                Definition::Decorator(decorator)
            }
            other => other,
        }
    }

    /// Injections that apply to an existing instance of `class`.
    ///
    /// An explicit object definition keyed by the class name wins; otherwise
    /// the class's attribute injections apply even with autowiring disabled.
    pub fn injections_for(&self, class: &str) -> Option<ObjectDefinition> {
        match self.lookup(class) {
            Some(Definition::Object(object)) => Some(object),
            _ => self.autowire.fragment(class),
        }
    }

    /// Every identifier any source answers for, sorted and deduplicated
    pub fn definition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .flat_map(|source| source.definition_names())
            .chain(self.autowire.definition_names())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceChain")
            .field("sources", &self.sources.len())
            .field("autowire", &self.autowire.enabled)
            .finish()
    }
}
