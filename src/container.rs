//! Definition-driven dependency injection container
//!
//! The `Container` looks identifiers up through the source chain, hands the
//! winning definition to its resolver and applies the definition's scope.
//! Singletons live in a lock-free `DashMap`; the identifiers currently being
//! resolved live on a thread-local stack so that cycles and runaway nesting
//! are detected without inspecting the call stack.

use crate::binder;
use crate::definition::{Callable, Definition, ExplicitArgs, Scope};
use crate::proxy::{self, instance_of};
use crate::reflection::{ClassDescriptor, ClassRegistry};
use crate::resolver;
use crate::source::{
    AutowireSource, DefinitionMap, DefinitionSource, EnvironmentReader, ProcessEnvironment,
    SourceChain,
};
use crate::{DiError, Result, Value};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Default limit on nested `get` calls per thread
pub const DEFAULT_MAX_DEPTH: usize = 256;

// =============================================================================
// Resolution Stack
// =============================================================================

/// What a frame on the resolution stack is building
#[derive(Debug, Clone, PartialEq, Eq)]
enum FrameKind {
    /// Pushed, definition not looked up yet
    Pending,
    /// Object or factory; a cycle through it can be broken with a proxy
    Buildable { class: Option<String> },
    Alias,
    Other,
}

impl FrameKind {
    fn of(definition: &Definition) -> Self {
        match definition {
            Definition::Object(d) => FrameKind::Buildable {
                class: Some(d.class_name.clone()),
            },
            Definition::Factory(d) => FrameKind::Buildable {
                class: d.class_hint.clone(),
            },
            Definition::Alias(_) => FrameKind::Alias,
            _ => FrameKind::Other,
        }
    }
}

struct Frame {
    /// Identity of the container that pushed the frame
    owner: usize,
    id: String,
    kind: FrameKind,
}

thread_local! {
    /// Identifiers being resolved on this thread, outermost first.
    ///
    /// Shared by every container on the thread; frames are tagged with their
    /// owner so two containers never see each other's entries as cycles.
    static RESOLUTION_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops its frame when dropped, on success and failure alike
struct StackGuard;

impl StackGuard {
    fn push(owner: usize, id: &str) -> Self {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                owner,
                id: id.to_string(),
                kind: FrameKind::Pending,
            });
        });
        StackGuard
    }

    /// Record what the top frame resolves to once its definition is known
    fn describe(&self, definition: &Definition) {
        RESOLUTION_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.kind = FrameKind::of(definition);
            }
        });
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[inline]
fn stack_depth() -> usize {
    RESOLUTION_STACK.with(|stack| stack.borrow().len())
}

/// How `get` reacts to an identifier that is already on the stack
enum Reentry {
    Proxy { class: String },
    AliasCycle { chain: Vec<String> },
    Circular { chain: Vec<String> },
}

// =============================================================================
// Configuration
// =============================================================================

/// Runtime options consumed by [`ContainerBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Derive definitions for registered classes that have no explicit one
    pub autowiring: bool,
    /// Maximum nesting of `get` calls before failing with `DepthExceeded`
    pub max_depth: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            autowiring: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// =============================================================================
// Container
// =============================================================================

struct ContainerInner {
    chain: SourceChain,
    /// Runtime overrides fed by `set`, queried before any other source
    overrides: Arc<DefinitionMap>,
    classes: Arc<ClassRegistry>,
    singletons: DashMap<String, Value, RandomState>,
    environment: Arc<dyn EnvironmentReader>,
    config: ContainerConfig,
}

/// Dependency injection container.
///
/// Cheap to clone; clones share definitions and the singleton cache.
///
/// # Examples
///
/// ```rust
/// use autowire::{ArgumentSpec, ClassDescriptor, ContainerBuilder, Definition, ObjectDefinition, ParamSpec};
///
/// struct Mailer { host: String }
///
/// let container = ContainerBuilder::new()
///     .register_class(
///         ClassDescriptor::builder::<Mailer>("Mailer")
///             .constructor(vec![ParamSpec::scalar("host", "string")], |args| {
///                 Ok(Mailer { host: args.string(0)? })
///             })
///             .build(),
///     )
///     .define(Definition::value("smtp.host", "localhost"))
///     .define(ObjectDefinition::new("mailer", "Mailer").constructor_arg("host", ArgumentSpec::link("smtp.host")))
///     .build()
///     .unwrap();
///
/// let mailer = container.get("mailer").unwrap().downcast::<Mailer>().unwrap();
/// assert_eq!(mailer.host, "localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning handle held by lazy proxies
#[derive(Clone)]
pub(crate) struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub(crate) fn upgrade(&self, id: &str) -> Result<Container> {
        self.inner
            .upgrade()
            .map(|inner| Container { inner })
            .ok_or_else(|| {
                DiError::creation_failed(id, "the container was dropped before initialization")
            })
    }
}

impl Container {
    /// Start configuring a container
    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve an identifier.
    ///
    /// Returns the cached value for singletons that were already built. An
    /// identifier that is already being resolved on this thread yields a
    /// deferred proxy when the cycle runs through an object or factory, and
    /// fails with `CircularDependency` otherwise.
    pub fn get(&self, id: &str) -> Result<Value> {
        if let Some(cached) = self.inner.singletons.get(id) {
            #[cfg(feature = "logging")]
            trace!(
                target: "autowire",
                id = id,
                location = "singleton_cache",
                "Entry resolved from cache"
            );
            return Ok(cached.value().clone());
        }

        if let Some(reentry) = self.reentry(id) {
            return self.break_cycle(id, reentry);
        }

        let guard = self.enter(id)?;
        self.resolve_entry(id, &guard)
            .map_err(|err| err.with_chain(self.current_chain()))
    }

    /// Check whether `id` can be resolved, without building anything.
    ///
    /// True for cached singletons and for any definition the source chain
    /// returns, except objects whose class cannot be instantiated. Aliases
    /// and decorators are judged by what they lead to.
    pub fn has(&self, id: &str) -> bool {
        let mut visited = Vec::new();
        self.has_entry(id, &mut visited)
    }

    fn has_entry(&self, id: &str, visited: &mut Vec<String>) -> bool {
        if self.inner.singletons.contains_key(id) {
            return true;
        }
        if visited.iter().any(|seen| seen == id) {
            return false;
        }
        visited.push(id.to_string());

        match self.inner.chain.lookup(id) {
            Some(definition) => self.can_build(&definition, visited),
            None => false,
        }
    }

    fn can_build(&self, definition: &Definition, visited: &mut Vec<String>) -> bool {
        match definition {
            Definition::Object(object) => self
                .inner
                .classes
                .get(&object.class_name)
                .is_some_and(|class| class.is_instantiable()),
            Definition::Alias(alias) => self.has_entry(&alias.target, visited),
            Definition::Decorator(decorator) => decorator
                .inner
                .as_deref()
                .is_some_and(|inner| self.can_build(inner, visited)),
            _ => true,
        }
    }

    /// Build a fresh value for `id`, bypassing and never filling the cache.
    ///
    /// `args` take precedence over the constructor arguments or factory
    /// parameters of the definition.
    pub fn make(&self, id: &str, args: ExplicitArgs) -> Result<Value> {
        let guard = self.enter(id)?;
        let result = match self.inner.chain.lookup(id) {
            Some(definition) => {
                guard.describe(&definition);

                #[cfg(feature = "logging")]
                debug!(
                    target: "autowire",
                    id = id,
                    kind = definition.kind_name(),
                    overrides = args.len(),
                    "Making fresh value"
                );

                resolver::resolve_with(self, &definition, &args)
            }
            None => Err(DiError::not_found(id)),
        };
        result.map_err(|err| err.with_chain(self.current_chain()))
    }

    /// Invoke a callable, binding its parameters like a factory's
    pub fn call(&self, callable: &Callable, args: ExplicitArgs) -> Result<Value> {
        #[cfg(feature = "logging")]
        trace!(
            target: "autowire",
            callable = callable.name(),
            "Calling through the binder"
        );

        let values = binder::bind(
            self,
            callable.params(),
            &[],
            &args,
            callable.name(),
            callable.name(),
        )?;
        callable.invoke(&crate::reflection::Arguments::new(values))
    }

    /// Apply method and property injections to an existing instance.
    ///
    /// `T` must be registered as a class; the constructor is never called.
    pub fn inject_all<T: Send + Sync + 'static>(&self, target: &mut T) -> Result<()> {
        let descriptor = self
            .inner
            .classes
            .by_type(TypeId::of::<T>())
            .ok_or_else(|| {
                DiError::invalid_definition(
                    std::any::type_name::<T>(),
                    "type is not registered as a class",
                )
            })?;
        self.inject_with(&descriptor, target)
    }

    /// Apply the injections declared for `class` to a type-erased instance
    pub fn inject_into(&self, class: &str, target: &mut (dyn Any + Send + Sync)) -> Result<()> {
        let descriptor = self.inner.classes.get(class).ok_or_else(|| {
            DiError::invalid_definition(class, format!("class {class} does not exist"))
        })?;
        self.inject_with(&descriptor, target)
    }

    fn inject_with(
        &self,
        descriptor: &ClassDescriptor,
        target: &mut (dyn Any + Send + Sync),
    ) -> Result<()> {
        let class = descriptor.name();
        let Some(injections) = self.inner.chain.injections_for(class) else {
            return Ok(());
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "autowire",
            class = class,
            methods = injections.method_injections.len(),
            properties = injections.property_injections.len(),
            "Injecting into existing instance"
        );

        let guard = self.enter(class)?;
        guard.describe(&Definition::Object(injections.clone()));
        resolver::inject_members(
            self,
            descriptor,
            target,
            class,
            &injections.method_injections,
            &injections.property_injections,
        )
        .map_err(|err| err.with_chain(self.current_chain()))
    }

    // =========================================================================
    // Runtime Definitions
    // =========================================================================

    /// Define (or redefine) an entry at runtime.
    ///
    /// Runtime definitions win over every configured source. A cached
    /// singleton for the same identifier is dropped; values already injected
    /// elsewhere are not touched.
    pub fn set(&self, definition: impl Into<Definition>) {
        let definition = definition.into();
        let id = definition.id().to_string();

        #[cfg(feature = "logging")]
        debug!(
            target: "autowire",
            id = id.as_str(),
            kind = definition.kind_name(),
            "Setting runtime definition"
        );

        self.inner.overrides.insert(definition);
        self.inner.singletons.remove(&id);
    }

    /// Shorthand for `set(Definition::value(id, value))`
    #[inline]
    pub fn set_value(&self, id: impl Into<String>, value: impl Into<Value>) {
        self.set(Definition::value(id, value));
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Every identifier some source can answer for
    pub fn known_entry_names(&self) -> Vec<String> {
        self.inner.chain.definition_names()
    }

    /// True while `id` is being resolved by this container on this thread
    pub fn is_resolving(&self, id: &str) -> bool {
        let owner = self.owner();
        RESOLUTION_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .any(|frame| frame.owner == owner && frame.id == id)
        })
    }

    /// Number of cached singletons
    #[inline]
    pub fn cached_len(&self) -> usize {
        self.inner.singletons.len()
    }

    /// Classes known to this container
    #[inline]
    pub fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    /// Where environment definitions read their variables
    #[inline]
    pub fn environment(&self) -> &dyn EnvironmentReader {
        &*self.inner.environment
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// True when both handles point at the same container
    #[inline]
    pub fn same_as(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Lifecycle Methods
    // =========================================================================

    /// Drop every cached singleton; the next `get` rebuilds them
    pub fn reset(&self) {
        let count = self.inner.singletons.len();
        self.inner.singletons.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "autowire",
            singletons_removed = count,
            "Container reset - singleton cache cleared"
        );
        #[cfg(not(feature = "logging"))]
        let _ = count;
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    #[inline]
    fn owner(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Push `id` onto the resolution stack, enforcing the depth limit
    fn enter(&self, id: &str) -> Result<StackGuard> {
        let depth = stack_depth();
        if depth >= self.inner.config.max_depth {
            #[cfg(feature = "logging")]
            debug!(
                target: "autowire",
                id = id,
                depth = depth,
                "Resolution depth limit reached"
            );

            let mut chain = self.current_chain();
            chain.push(id.to_string());
            return Err(DiError::DepthExceeded {
                limit: self.inner.config.max_depth,
                id: id.to_string(),
            }
            .with_chain(chain));
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "autowire",
            id = id,
            depth = depth,
            "Resolving entry"
        );

        Ok(StackGuard::push(self.owner(), id))
    }

    fn resolve_entry(&self, id: &str, guard: &StackGuard) -> Result<Value> {
        let definition = self.inner.chain.lookup(id).ok_or_else(|| {
            #[cfg(feature = "logging")]
            debug!(target: "autowire", id = id, "No definition found");
            DiError::not_found(id)
        })?;
        guard.describe(&definition);

        let value = resolver::resolve(self, &definition)?;

        if definition.scope() == Scope::Singleton {
            // First committed value wins when two threads race on the same entry.
            let committed = self
                .inner
                .singletons
                .entry(id.to_string())
                .or_insert(value)
                .value()
                .clone();

            #[cfg(feature = "logging")]
            debug!(
                target: "autowire",
                id = id,
                scope = "singleton",
                cached = self.inner.singletons.len(),
                "Singleton cached"
            );

            return Ok(committed);
        }

        Ok(value)
    }

    /// Identifiers this container is resolving on this thread, outermost first
    fn current_chain(&self) -> Vec<String> {
        let owner = self.owner();
        RESOLUTION_STACK.with(|stack| {
            stack
                .borrow()
                .iter()
                .filter(|frame| frame.owner == owner)
                .map(|frame| frame.id.clone())
                .collect()
        })
    }

    /// Classify a repeated request for an identifier already on the stack
    fn reentry(&self, id: &str) -> Option<Reentry> {
        let owner = self.owner();
        RESOLUTION_STACK.with(|stack| {
            let stack = stack.borrow();
            let frames: Vec<&Frame> = stack.iter().filter(|f| f.owner == owner).collect();
            let start = frames.iter().position(|f| f.id == id)?;
            let segment = &frames[start..];

            let mut chain: Vec<String> = segment.iter().map(|f| f.id.clone()).collect();
            chain.push(id.to_string());

            // Aliases are pure indirection: look through them.
            match segment.iter().find(|f| f.kind != FrameKind::Alias) {
                None => Some(Reentry::AliasCycle { chain }),
                Some(frame) => match &frame.kind {
                    FrameKind::Buildable { class } => Some(Reentry::Proxy {
                        class: class.clone().unwrap_or_else(|| frame.id.clone()),
                    }),
                    _ => Some(Reentry::Circular { chain }),
                },
            }
        })
    }

    #[cold]
    fn break_cycle(&self, id: &str, reentry: Reentry) -> Result<Value> {
        match reentry {
            Reentry::AliasCycle { chain } => Err(DiError::invalid_definition(
                id,
                format!("alias cycle: {}", chain.join(" -> ")),
            )),
            Reentry::Circular { chain } => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "autowire",
                    id = id,
                    chain = chain.join(" -> ").as_str(),
                    "Circular dependency cannot be deferred"
                );
                Err(DiError::CircularDependency { chain })
            }
            Reentry::Proxy { class } => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "autowire",
                    id = id,
                    class = class.as_str(),
                    "Cycle detected, deferring with a lazy proxy"
                );

                let descriptor = self.inner.classes.get(&class);
                let container = self.downgrade();
                let id = id.to_string();

                Ok(Value::Object(proxy::create_deferred(
                    class,
                    descriptor,
                    move || {
                        let container = container.upgrade(&id)?;
                        if container.is_resolving(&id) {
                            return Err(DiError::CircularDependency {
                                chain: vec![id.clone(), id.clone()],
                            });
                        }
                        instance_of(&id, container.get(&id)?)
                    },
                )))
            }
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("sources", &self.inner.chain)
            .field("classes", &self.inner.classes.len())
            .field("singletons", &self.inner.singletons.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles the source chain, class registry and configuration.
///
/// Priority, highest first: runtime `set` definitions, entries added with
/// [`define`](Self::define), sources added with
/// [`add_definitions`](Self::add_definitions) (later ones first), then
/// autowiring.
pub struct ContainerBuilder {
    definitions: DefinitionMap,
    sources: Vec<Arc<dyn DefinitionSource>>,
    classes: ClassRegistry,
    environment: Option<Arc<dyn EnvironmentReader>>,
    config: ContainerConfig,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            definitions: DefinitionMap::new(),
            sources: Vec::new(),
            classes: ClassRegistry::new(),
            environment: None,
            config: ContainerConfig::default(),
        }
    }

    /// Add a set of definitions, overriding sources added before it
    pub fn add_definitions(self, definitions: DefinitionMap) -> Self {
        self.add_source(definitions)
    }

    /// Add any definition source, overriding sources added before it
    pub fn add_source(mut self, source: impl DefinitionSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Add a single definition with the highest configured priority
    pub fn define(self, definition: impl Into<Definition>) -> Self {
        self.definitions.insert(definition);
        self
    }

    pub fn register_class(self, descriptor: ClassDescriptor) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "autowire",
            class = descriptor.name(),
            "Registering class"
        );

        self.classes.register(descriptor);
        self
    }

    /// Read environment definitions from `reader` instead of the process environment
    pub fn environment(mut self, reader: impl EnvironmentReader + 'static) -> Self {
        self.environment = Some(Arc::new(reader));
        self
    }

    pub fn autowiring(mut self, enabled: bool) -> Self {
        self.config.autowiring = enabled;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Finish the container, rejecting alias cycles
    pub fn build(self) -> Result<Container> {
        let classes = Arc::new(self.classes);
        let overrides = Arc::new(DefinitionMap::new());

        let mut sources: Vec<Arc<dyn DefinitionSource>> = Vec::with_capacity(self.sources.len() + 2);
        sources.push(Arc::clone(&overrides) as Arc<dyn DefinitionSource>);
        sources.push(Arc::new(self.definitions));
        sources.extend(self.sources.into_iter().rev());

        let chain = SourceChain::new(
            sources,
            AutowireSource::new(Arc::clone(&classes), self.config.autowiring),
        );
        validate_aliases(&chain)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "autowire",
            classes = classes.len(),
            autowiring = self.config.autowiring,
            max_depth = self.config.max_depth,
            "Container built"
        );

        Ok(Container {
            inner: Arc::new(ContainerInner {
                chain,
                overrides,
                classes,
                singletons: DashMap::with_hasher(RandomState::new()),
                environment: self
                    .environment
                    .unwrap_or_else(|| Arc::new(ProcessEnvironment) as Arc<dyn EnvironmentReader>),
                config: self.config,
            }),
        })
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("definitions", &self.definitions.len())
            .field("sources", &self.sources.len())
            .field("classes", &self.classes.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Follow every alias chain and fail on the first one that loops
fn validate_aliases(chain: &SourceChain) -> Result<()> {
    for name in chain.definition_names() {
        let mut seen = vec![name.clone()];
        let mut current = name;

        while let Some(Definition::Alias(alias)) = chain.lookup(&current) {
            let looped = seen.contains(&alias.target);
            seen.push(alias.target.clone());
            if looped {
                return Err(DiError::invalid_definition(
                    &seen[0],
                    format!("alias cycle: {}", seen.join(" -> ")),
                ));
            }
            current = alias.target;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        ArgumentSpec, DecoratorDefinition, FactoryDefinition, ObjectDefinition,
    };
    use crate::reflection::{ParamSpec, ParamType};
    use crate::{ErrorKind, ObjectRef};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Engine;

    struct Car {
        engine: Arc<Engine>,
    }

    fn engine_and_car() -> ContainerBuilder {
        ContainerBuilder::new()
            .register_class(
                ClassDescriptor::builder::<Engine>("Engine")
                    .constructor(vec![], |_| Ok(Engine))
                    .build(),
            )
            .register_class(
                ClassDescriptor::builder::<Car>("Car")
                    .constructor(vec![ParamSpec::class("engine", "Engine")], |args| {
                        Ok(Car {
                            engine: args.object::<Engine>(0)?,
                        })
                    })
                    .build(),
            )
    }

    #[test]
    fn test_singleton_identity() {
        let container = engine_and_car().build().unwrap();

        let a = container.get("Car").unwrap();
        let b = container.get("Car").unwrap();
        assert_eq!(a, b);

        let car = a.downcast::<Car>().unwrap();
        let engine = container.get("Engine").unwrap().downcast::<Engine>().unwrap();
        assert!(Arc::ptr_eq(&car.engine, &engine));
    }

    #[test]
    fn test_prototype_distinct() {
        let container = engine_and_car()
            .define(ObjectDefinition::new("car", "Car").prototype())
            .build()
            .unwrap();

        let a = container.get("car").unwrap();
        let b = container.get("car").unwrap();
        assert_ne!(a, b);

        // Both share the singleton engine.
        let a = a.downcast::<Car>().unwrap();
        let b = b.downcast::<Car>().unwrap();
        assert!(Arc::ptr_eq(&a.engine, &b.engine));
    }

    #[test]
    fn test_alias_respects_target_scope() {
        let container = engine_and_car()
            .define(Definition::alias("motor", "Engine"))
            .build()
            .unwrap();

        assert_eq!(
            container.get("motor").unwrap(),
            container.get("Engine").unwrap()
        );
    }

    #[test]
    fn test_alias_target_missing() {
        let container = ContainerBuilder::new()
            .define(Definition::alias("db", "database"))
            .build()
            .unwrap();

        let err = container.get("db").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AliasTargetMissing);
        assert_eq!(err.chain(), ["db".to_string(), "database".to_string()]);
    }

    #[test]
    fn test_alias_cycle_rejected_at_build() {
        let err = ContainerBuilder::new()
            .define(Definition::alias("a", "b"))
            .define(Definition::alias("b", "c"))
            .define(Definition::alias("c", "a"))
            .build()
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidDefinition);
        assert!(err.to_string().contains("alias cycle"));
    }

    #[test]
    fn test_alias_cycle_introduced_at_runtime() {
        let container = ContainerBuilder::new()
            .define(Definition::alias("a", "b"))
            .define(Definition::value("b", 1))
            .build()
            .unwrap();
        container.set(Definition::alias("b", "a"));

        let err = container.get("a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDefinition);
    }

    #[test]
    fn test_has_does_not_construct() {
        static BUILT: AtomicU32 = AtomicU32::new(0);

        let container = ContainerBuilder::new()
            .register_class(
                ClassDescriptor::builder::<Engine>("Engine")
                    .constructor(vec![], |_| {
                        BUILT.fetch_add(1, Ordering::SeqCst);
                        Ok(Engine)
                    })
                    .build(),
            )
            .register_class(ClassDescriptor::interface("EngineInterface"))
            .build()
            .unwrap();

        assert!(container.has("Engine"));
        assert!(!container.has("EngineInterface"));
        assert!(!container.has("nothing"));
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);
        assert_eq!(container.cached_len(), 0);
    }

    #[test]
    fn test_has_follows_aliases_and_decorators() {
        let container = ContainerBuilder::new()
            .register_class(
                ClassDescriptor::builder::<Engine>("Engine")
                    .constructor(vec![], |_| Ok(Engine))
                    .build(),
            )
            .register_class(ClassDescriptor::interface("EngineInterface"))
            .register_class(ClassDescriptor::abstract_class("AbstractEngine"))
            .define(Definition::alias("EngineInterface", "AbstractEngine"))
            .define(Definition::alias("engine", "Engine"))
            .define(Definition::alias("dangling", "missing"))
            .build()
            .unwrap();

        assert!(container.has("engine"));
        assert!(!container.has("EngineInterface"));
        assert!(!container.has("dangling"));

        container.set(DecoratorDefinition::new("engine", |v, _| Ok(v)));
        assert!(container.has("engine"));
        container.set(DecoratorDefinition::new("bare", |v, _| Ok(v)));
        assert!(!container.has("bare"));

        container.set(Definition::alias("loop.a", "loop.b"));
        container.set(Definition::alias("loop.b", "loop.a"));
        assert!(!container.has("loop.a"));
    }

    #[test]
    fn test_nullable_param_binds_null_when_alias_leads_to_abstract_class() {
        struct Repo {
            cache: Option<Arc<Engine>>,
        }

        let container = ContainerBuilder::new()
            .register_class(ClassDescriptor::interface("EngineInterface"))
            .register_class(ClassDescriptor::abstract_class("AbstractEngine"))
            .register_class(
                ClassDescriptor::builder::<Repo>("Repo")
                    .constructor(
                        vec![ParamSpec::class("cache", "EngineInterface").nullable()],
                        |args| {
                            Ok(Repo {
                                cache: args.optional_object::<Engine>(0)?,
                            })
                        },
                    )
                    .build(),
            )
            .define(Definition::alias("EngineInterface", "AbstractEngine"))
            .build()
            .unwrap();

        let repo = container.get("Repo").unwrap().downcast::<Repo>().unwrap();
        assert!(repo.cache.is_none());
    }

    #[test]
    fn test_cycle_broken_with_proxy() {
        struct Parent {
            child: Arc<Child>,
        }
        struct Child {
            parent: ObjectRef,
        }

        let container = ContainerBuilder::new()
            .register_class(
                ClassDescriptor::builder::<Parent>("Parent")
                    .constructor(vec![ParamSpec::class("child", "Child")], |args| {
                        Ok(Parent {
                            child: args.object::<Child>(0)?,
                        })
                    })
                    .build(),
            )
            .register_class(
                ClassDescriptor::builder::<Child>("Child")
                    .constructor(vec![ParamSpec::class("parent", "Parent")], |args| {
                        Ok(Child {
                            parent: args.object_ref(0)?,
                        })
                    })
                    .build(),
            )
            .build()
            .unwrap();

        let parent = container.get("Parent").unwrap();
        let built = parent.downcast::<Parent>().unwrap();
        let child_parent = &built.child.parent;

        assert!(child_parent.is_lazy());
        assert!(!child_parent.is_initialized());
        assert!(child_parent.downcast::<Parent>().is_ok());
        assert_eq!(Value::Object(child_parent.clone()), parent);
    }

    #[test]
    fn test_cycle_forced_during_construction_fails() {
        struct Left;
        struct Right;

        let container = ContainerBuilder::new()
            .register_class(
                ClassDescriptor::builder::<Left>("Left")
                    .constructor(vec![ParamSpec::class("right", "Right")], |args| {
                        args.object::<Right>(0)?;
                        Ok(Left)
                    })
                    .build(),
            )
            .register_class(
                ClassDescriptor::builder::<Right>("Right")
                    .constructor(vec![ParamSpec::class("left", "Left")], |args| {
                        // Touching the proxy while Left is still being built
                        args.object::<Left>(0)?;
                        Ok(Right)
                    })
                    .build(),
            )
            .build()
            .unwrap();

        let err = container.get("Left").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularDependency);
        assert!(!container.is_resolving("Left"));
        assert_eq!(container.cached_len(), 0);
    }

    #[test]
    fn test_value_cycle_is_circular_dependency() {
        let container = ContainerBuilder::new()
            .define(Definition::collection("a", vec![ArgumentSpec::link("b")]))
            .define(Definition::collection("b", vec![ArgumentSpec::link("a")]))
            .build()
            .unwrap();

        let err = container.get("a").unwrap_err();
        match err.root() {
            DiError::CircularDependency { chain } => assert_eq!(chain, &["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_singleton_is_not_cached() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

        let callable = Callable::new("flaky", vec![], |_| {
            if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DiError::creation_failed("flaky", "not yet"));
            }
            Ok(Value::Object(ObjectRef::new("Engine", Engine)))
        });
        let container = ContainerBuilder::new()
            .define(FactoryDefinition::new("flaky", callable))
            .build()
            .unwrap();

        assert_eq!(
            container.get("flaky").unwrap_err().kind(),
            ErrorKind::CreationFailed
        );
        assert_eq!(container.cached_len(), 0);
        assert!(!container.is_resolving("flaky"));

        let first = container.get("flaky").unwrap();
        assert_eq!(container.get("flaky").unwrap(), first);
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_depth_guard() {
        let mut builder = ContainerBuilder::new().max_depth(8);
        for i in 0..20 {
            let callable = Callable::new(format!("step{i}"), vec![ParamSpec::new("next")], |args| {
                Ok(args.value(0)?.clone())
            });
            builder = builder.define(
                FactoryDefinition::new(format!("n{i}"), callable)
                    .parameter("next", ArgumentSpec::link(format!("n{}", i + 1))),
            );
        }
        let container = builder.define(Definition::value("n20", "end")).build().unwrap();

        let err = container.get("n0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DepthExceeded);
        assert_eq!(err.chain().len(), 9);
        assert_eq!(stack_depth(), 0);
    }

    #[test]
    fn test_error_chain_names_the_path() {
        let container = engine_and_car()
            .define(
                ObjectDefinition::new("garage", "Car")
                    .constructor_arg("engine", ArgumentSpec::link("v8")),
            )
            .build()
            .unwrap();

        let err = container.get("garage").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.chain(), ["garage".to_string(), "v8".to_string()]);
        assert!(err.to_string().contains("garage -> v8"));
    }

    #[test]
    fn test_make_ignores_cache() {
        let container = engine_and_car().build().unwrap();

        let cached = container.get("Engine").unwrap();
        let fresh = container.make("Engine", vec![]).unwrap();
        assert_ne!(cached, fresh);
        assert_eq!(container.get("Engine").unwrap(), cached);
    }

    #[test]
    fn test_make_with_arguments() {
        let container = engine_and_car().build().unwrap();
        let custom = Value::Object(ObjectRef::new("Engine", Engine));

        let car = container
            .make("Car", vec![("engine".into(), ArgumentSpec::Literal(custom.clone()))])
            .unwrap()
            .downcast::<Car>()
            .unwrap();
        assert!(Arc::ptr_eq(&car.engine, &custom.downcast::<Engine>().unwrap()));
    }

    #[test]
    fn test_set_overrides_and_evicts() {
        let container = ContainerBuilder::new()
            .define(Definition::value("mode", "dev"))
            .build()
            .unwrap();

        container.set_value("mode", "prod");
        assert_eq!(container.get("mode").unwrap(), Value::from("prod"));
        assert!(container.known_entry_names().contains(&"mode".to_string()));
    }

    #[test]
    fn test_reset_rebuilds_singletons() {
        let container = engine_and_car().build().unwrap();
        let before = container.get("Engine").unwrap();

        container.reset();
        assert_eq!(container.cached_len(), 0);
        assert_ne!(container.get("Engine").unwrap(), before);
    }

    #[test]
    fn test_later_sources_win() {
        let container = ContainerBuilder::new()
            .add_definitions(DefinitionMap::new().with(Definition::value("level", "info")))
            .add_definitions(DefinitionMap::new().with(Definition::value("level", "debug")))
            .build()
            .unwrap();
        assert_eq!(container.get("level").unwrap(), Value::from("debug"));

        let container = ContainerBuilder::new()
            .add_definitions(DefinitionMap::new().with(Definition::value("level", "info")))
            .define(Definition::value("level", "warn"))
            .build()
            .unwrap();
        assert_eq!(container.get("level").unwrap(), Value::from("warn"));
    }

    #[test]
    fn test_autowiring_disabled() {
        let container = engine_and_car().autowiring(false).build().unwrap();
        assert_eq!(container.get("Engine").unwrap_err().kind(), ErrorKind::NotFound);

        let container = engine_and_car()
            .autowiring(false)
            .define(ObjectDefinition::autowire("Engine"))
            .build()
            .unwrap();
        assert!(container.get("Engine").is_ok());
    }

    #[test]
    fn test_call_binds_parameters() {
        let container = engine_and_car()
            .define(Definition::value("greeting", "hi"))
            .build()
            .unwrap();
        let callable = Callable::new(
            "greet",
            vec![ParamSpec::new("greeting"), ParamSpec::class("engine", "Engine")],
            |args| {
                args.object::<Engine>(1)?;
                Ok(Value::Str(format!("{} there", args.string(0)?)))
            },
        );

        let value = container
            .call(&callable, vec![("greeting".into(), ArgumentSpec::link("greeting"))])
            .unwrap();
        assert_eq!(value, Value::from("hi there"));
    }

    #[test]
    fn test_inject_all_into_existing_instance() {
        #[derive(Default)]
        struct Controller {
            engine: Option<Arc<Engine>>,
            name: String,
        }

        let container = engine_and_car()
            .register_class(
                ClassDescriptor::builder::<Controller>("Controller")
                    .property("engine", ParamType::Class("Engine".into()), |this, value| {
                        this.engine = Some(value.downcast::<Engine>()?);
                        Ok(())
                    })
                    .method("setName", vec![ParamSpec::new("name")], |this, args| {
                        this.name = args.string(0)?;
                        Ok(())
                    })
                    .inject_property("engine", ArgumentSpec::Unset)
                    .inject_method("setName", vec![(0.into(), ArgumentSpec::value("home"))])
                    .build(),
            )
            .build()
            .unwrap();

        let mut controller = Controller::default();
        container.inject_all(&mut controller).unwrap();

        assert_eq!(controller.name, "home");
        assert!(Arc::ptr_eq(
            controller.engine.as_ref().unwrap(),
            &container.get("Engine").unwrap().downcast::<Engine>().unwrap()
        ));

        let err = container.inject_all(&mut String::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDefinition);
    }

    #[test]
    fn test_concurrent_singleton_commits_once() {
        let container = engine_and_car().build().unwrap();

        let values: Vec<Value> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| container.get("Car").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for value in &values {
            assert_eq!(value, &values[0]);
        }
    }

    #[test]
    fn test_containers_do_not_share_stacks() {
        let outer = engine_and_car().build().unwrap();
        let inner = engine_and_car().build().unwrap();

        let callable = Callable::new("nested", vec![], move |_| inner.get("Car"));
        outer.set(FactoryDefinition::new("Car", callable));

        assert!(outer.get("Car").unwrap().downcast::<Car>().is_ok());
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Container>();
        assert_send_sync::<Value>();
    }
}
