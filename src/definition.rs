//! Definitions describe how to produce the value for an identifier
//!
//! Definitions are plain data built at bootstrap (by hand, by a loader, or
//! from class attributes) and never mutated once handed to the container.

use crate::reflection::{Arguments, ParamSpec};
use crate::{Container, Result, Value};
use std::fmt;
use std::sync::Arc;

/// Lifecycle policy of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance per container, cached after the first successful resolve
    #[default]
    Singleton,

    /// New value on every resolve
    Prototype,
}

/// Key of an explicit argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Name(String),
    Position(usize),
}

impl From<&str> for ArgKey {
    fn from(name: &str) -> Self {
        ArgKey::Name(name.to_string())
    }
}

impl From<String> for ArgKey {
    fn from(name: String) -> Self {
        ArgKey::Name(name)
    }
}

impl From<usize> for ArgKey {
    fn from(position: usize) -> Self {
        ArgKey::Position(position)
    }
}

/// How one argument, collection entry or property gets its value
#[derive(Debug, Clone)]
pub enum ArgumentSpec {
    /// Use the value as-is
    Literal(Value),
    /// Resolve another identifier through the container
    Link(String),
    /// Leave to autowiring
    Unset,
    /// Inline definition, resolved in place and never cached
    Nested(Box<Definition>),
}

impl ArgumentSpec {
    pub fn value(value: impl Into<Value>) -> Self {
        ArgumentSpec::Literal(value.into())
    }

    pub fn link(id: impl Into<String>) -> Self {
        ArgumentSpec::Link(id.into())
    }

    pub fn nested(definition: impl Into<Definition>) -> Self {
        ArgumentSpec::Nested(Box::new(definition.into()))
    }
}

/// Explicit arguments, in declaration order
pub type ExplicitArgs = Vec<(ArgKey, ArgumentSpec)>;

/// Property injections, in declaration order
pub type PropertyInjections = Vec<(String, ArgumentSpec)>;

/// A method to call on a freshly built instance
#[derive(Debug, Clone)]
pub struct MethodInjection {
    pub method: String,
    pub args: ExplicitArgs,
}

// =============================================================================
// Callables
// =============================================================================

type CallFn = Arc<dyn Fn(&Arguments) -> Result<Value> + Send + Sync>;

/// A named function with a declared signature, invoked through the binder
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    params: Vec<ParamSpec>,
    func: CallFn,
}

impl Callable {
    pub fn new<F>(name: impl Into<Arc<str>>, params: Vec<ParamSpec>, func: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params,
            func: Arc::new(func),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    #[inline]
    pub(crate) fn invoke(&self, args: &Arguments) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

type DecorateFn = Arc<dyn Fn(Value, &Container) -> Result<Value> + Send + Sync>;

// =============================================================================
// Definition variants
// =============================================================================

/// A literal, already-resolved value
#[derive(Debug, Clone)]
pub struct ValueDefinition {
    pub id: String,
    pub value: Value,
}

/// Build an instance of a class
#[derive(Debug, Clone)]
pub struct ObjectDefinition {
    pub id: String,
    pub class_name: String,
    pub scope: Scope,
    pub lazy: bool,
    pub constructor_args: ExplicitArgs,
    pub method_injections: Vec<MethodInjection>,
    pub property_injections: PropertyInjections,
}

impl ObjectDefinition {
    pub fn new(id: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            scope: Scope::Singleton,
            lazy: false,
            constructor_args: Vec::new(),
            method_injections: Vec::new(),
            property_injections: Vec::new(),
        }
    }

    /// Autowired definition whose identifier is the class name
    pub fn autowire(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self::new(class_name.clone(), class_name)
    }

    /// Explicit constructor argument, by name or position
    pub fn constructor_arg(mut self, key: impl Into<ArgKey>, spec: ArgumentSpec) -> Self {
        self.constructor_args.push((key.into(), spec));
        self
    }

    /// Call `method` after construction
    pub fn method_call(mut self, method: impl Into<String>, args: ExplicitArgs) -> Self {
        self.method_injections.push(MethodInjection {
            method: method.into(),
            args,
        });
        self
    }

    /// Assign `property` after construction
    pub fn property(mut self, property: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.property_injections.push((property.into(), spec));
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Append injections this definition does not already declare
    pub(crate) fn accumulate(
        &mut self,
        methods: &[MethodInjection],
        properties: &[(String, ArgumentSpec)],
    ) {
        for injection in methods {
            if !self
                .method_injections
                .iter()
                .any(|m| m.method == injection.method)
            {
                self.method_injections.push(injection.clone());
            }
        }
        for (name, spec) in properties {
            if !self.property_injections.iter().any(|(p, _)| p == name) {
                self.property_injections.push((name.clone(), spec.clone()));
            }
        }
    }
}

/// Invoke a callable to produce the value
#[derive(Debug, Clone)]
pub struct FactoryDefinition {
    pub id: String,
    pub callable: Callable,
    pub scope: Scope,
    pub lazy: bool,
    /// Class name reported by the lazy proxy
    pub class_hint: Option<String>,
    pub parameters: ExplicitArgs,
}

impl FactoryDefinition {
    pub fn new(id: impl Into<String>, callable: Callable) -> Self {
        Self {
            id: id.into(),
            callable,
            scope: Scope::Singleton,
            lazy: false,
            class_hint: None,
            parameters: Vec::new(),
        }
    }

    pub fn parameter(mut self, key: impl Into<ArgKey>, spec: ArgumentSpec) -> Self {
        self.parameters.push((key.into(), spec));
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    /// Defer the call until first access; the factory must produce an object
    pub fn lazy(mut self, class_hint: impl Into<String>) -> Self {
        self.lazy = true;
        self.class_hint = Some(class_hint.into());
        self
    }
}

/// Pure indirection to another identifier
#[derive(Debug, Clone)]
pub struct AliasDefinition {
    pub id: String,
    pub target: String,
}

/// Read a process environment variable
#[derive(Debug, Clone)]
pub struct EnvironmentDefinition {
    pub id: String,
    pub variable: String,
    pub default: Option<ArgumentSpec>,
}

/// Ordered sequence of resolved entries
#[derive(Debug, Clone)]
pub struct CollectionDefinition {
    pub id: String,
    pub entries: Vec<ArgumentSpec>,
}

/// Post-process the value produced by a lower-priority definition
#[derive(Clone)]
pub struct DecoratorDefinition {
    pub id: String,
    decorator: DecorateFn,
    /// Filled in by the source chain when left empty
    pub inner: Option<Box<Definition>>,
}

impl DecoratorDefinition {
    pub fn new<F>(id: impl Into<String>, decorator: F) -> Self
    where
        F: Fn(Value, &Container) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            decorator: Arc::new(decorator),
            inner: None,
        }
    }

    /// Decorate an explicit definition instead of the one found below
    pub fn wrapping(mut self, inner: impl Into<Definition>) -> Self {
        self.inner = Some(Box::new(inner.into()));
        self
    }

    #[inline]
    pub(crate) fn decorate(&self, value: Value, container: &Container) -> Result<Value> {
        (self.decorator)(value, container)
    }
}

impl fmt::Debug for DecoratorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorDefinition")
            .field("id", &self.id)
            .field("inner", &self.inner)
            .finish()
    }
}

/// How to produce the value for an identifier
#[derive(Debug, Clone)]
pub enum Definition {
    Value(ValueDefinition),
    Object(ObjectDefinition),
    Factory(FactoryDefinition),
    Alias(AliasDefinition),
    Environment(EnvironmentDefinition),
    Collection(CollectionDefinition),
    Decorator(DecoratorDefinition),
}

impl Definition {
    pub fn value(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Definition::Value(ValueDefinition {
            id: id.into(),
            value: value.into(),
        })
    }

    pub fn alias(id: impl Into<String>, target: impl Into<String>) -> Self {
        Definition::Alias(AliasDefinition {
            id: id.into(),
            target: target.into(),
        })
    }

    pub fn env(id: impl Into<String>, variable: impl Into<String>) -> Self {
        Definition::Environment(EnvironmentDefinition {
            id: id.into(),
            variable: variable.into(),
            default: None,
        })
    }

    pub fn env_or(id: impl Into<String>, variable: impl Into<String>, default: ArgumentSpec) -> Self {
        Definition::Environment(EnvironmentDefinition {
            id: id.into(),
            variable: variable.into(),
            default: Some(default),
        })
    }

    pub fn collection(id: impl Into<String>, entries: Vec<ArgumentSpec>) -> Self {
        Definition::Collection(CollectionDefinition {
            id: id.into(),
            entries,
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        match self {
            Definition::Value(d) => &d.id,
            Definition::Object(d) => &d.id,
            Definition::Factory(d) => &d.id,
            Definition::Alias(d) => &d.id,
            Definition::Environment(d) => &d.id,
            Definition::Collection(d) => &d.id,
            Definition::Decorator(d) => &d.id,
        }
    }

    /// Scope the container applies to the resolved value.
    ///
    /// Only objects, factories and decorators over them are ever cached;
    /// aliases inherit their target's caching by delegating to `get`.
    pub fn scope(&self) -> Scope {
        match self {
            Definition::Object(d) => d.scope,
            Definition::Factory(d) => d.scope,
            Definition::Decorator(d) => d
                .inner
                .as_ref()
                .map(|inner| inner.scope())
                .unwrap_or(Scope::Singleton),
            Definition::Value(_)
            | Definition::Alias(_)
            | Definition::Environment(_)
            | Definition::Collection(_) => Scope::Prototype,
        }
    }

    /// Short name of the variant, for logs and errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            Definition::Value(_) => "value",
            Definition::Object(_) => "object",
            Definition::Factory(_) => "factory",
            Definition::Alias(_) => "alias",
            Definition::Environment(_) => "env",
            Definition::Collection(_) => "collection",
            Definition::Decorator(_) => "decorator",
        }
    }
}

impl From<ValueDefinition> for Definition {
    fn from(d: ValueDefinition) -> Self {
        Definition::Value(d)
    }
}

impl From<ObjectDefinition> for Definition {
    fn from(d: ObjectDefinition) -> Self {
        Definition::Object(d)
    }
}

impl From<FactoryDefinition> for Definition {
    fn from(d: FactoryDefinition) -> Self {
        Definition::Factory(d)
    }
}

impl From<AliasDefinition> for Definition {
    fn from(d: AliasDefinition) -> Self {
        Definition::Alias(d)
    }
}

impl From<EnvironmentDefinition> for Definition {
    fn from(d: EnvironmentDefinition) -> Self {
        Definition::Environment(d)
    }
}

impl From<CollectionDefinition> for Definition {
    fn from(d: CollectionDefinition) -> Self {
        Definition::Collection(d)
    }
}

impl From<DecoratorDefinition> for Definition {
    fn from(d: DecoratorDefinition) -> Self {
        Definition::Decorator(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scopes() {
        assert_eq!(
            Definition::from(ObjectDefinition::new("a", "A")).scope(),
            Scope::Singleton
        );
        assert_eq!(
            Definition::from(ObjectDefinition::new("a", "A").prototype()).scope(),
            Scope::Prototype
        );
        assert_eq!(Definition::alias("a", "b").scope(), Scope::Prototype);
        assert_eq!(Definition::value("a", 1).scope(), Scope::Prototype);
    }

    #[test]
    fn test_decorator_inherits_inner_scope() {
        let decorator = DecoratorDefinition::new("a", |value, _| Ok(value))
            .wrapping(ObjectDefinition::new("a", "A").prototype());
        assert_eq!(Definition::from(decorator).scope(), Scope::Prototype);
    }

    #[test]
    fn test_accumulate_keeps_explicit_injections() {
        let mut definition = ObjectDefinition::new("a", "A")
            .property("logger", ArgumentSpec::link("file-logger"))
            .method_call("setCache", vec![]);

        definition.accumulate(
            &[
                MethodInjection {
                    method: "setCache".into(),
                    args: vec![(ArgKey::Position(0), ArgumentSpec::link("other"))],
                },
                MethodInjection {
                    method: "setClock".into(),
                    args: vec![],
                },
            ],
            &[
                ("logger".into(), ArgumentSpec::Unset),
                ("mailer".into(), ArgumentSpec::Unset),
            ],
        );

        assert_eq!(definition.method_injections.len(), 2);
        assert!(definition.method_injections[0].args.is_empty());
        assert_eq!(definition.property_injections.len(), 2);
        assert!(matches!(
            definition.property_injections[0].1,
            ArgumentSpec::Link(ref id) if id == "file-logger"
        ));
    }

    #[test]
    fn test_ids() {
        let callable = Callable::new("make_port", vec![], |_| Ok(Value::Int(80)));
        let factory = FactoryDefinition::new("port", callable).prototype();
        assert_eq!(Definition::from(factory).id(), "port");
        assert_eq!(Definition::env("home", "HOME").kind_name(), "env");
    }
}
