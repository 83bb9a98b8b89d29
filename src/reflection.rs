//! Class metadata consumed by the resolver
//!
//! Rust has no runtime reflection, so every class the container can build is
//! described up front by a [`ClassDescriptor`]: its constructor signature,
//! injectable methods and properties, and any injection points discovered
//! from attributes at bootstrap.

use crate::definition::{ArgumentSpec, ExplicitArgs, MethodInjection, PropertyInjections};
use crate::value::ObjectRef;
use crate::{Container, DiError, Result, Value};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Parameters
// =============================================================================

/// Declared type of a parameter or property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// No declared type
    Untyped,
    /// Builtin scalar type (`string`, `int`, ...), never looked up in the container
    Scalar(&'static str),
    /// Class or interface identifier, autowired through the container
    Class(String),
    /// Receives the live container
    Container,
    /// Receives the identifier currently being resolved
    RequestedEntry,
}

/// Declared parameter of a constructor, method or factory
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
    pub nullable: bool,
    pub variadic: bool,
}

impl ParamSpec {
    /// Untyped parameter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Untyped,
            default: None,
            nullable: false,
            variadic: false,
        }
    }

    /// Parameter typed with a class or interface
    pub fn class(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            ty: ParamType::Class(class.into()),
            ..Self::new(name)
        }
    }

    /// Parameter typed with a builtin scalar
    pub fn scalar(name: impl Into<String>, kind: &'static str) -> Self {
        Self {
            ty: ParamType::Scalar(kind),
            ..Self::new(name)
        }
    }

    /// Parameter that receives the container itself
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            ty: ParamType::Container,
            ..Self::new(name)
        }
    }

    /// Parameter that receives the requested identifier
    pub fn requested_entry(name: impl Into<String>) -> Self {
        Self {
            ty: ParamType::RequestedEntry,
            ..Self::new(name)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// Bound argument values handed to constructors, methods and factories
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position)
    }

    /// Argument at `position`, failing when it was not bound
    pub fn value(&self, position: usize) -> Result<&Value> {
        self.values
            .get(position)
            .ok_or_else(|| DiError::invalid_argument(position, "no argument bound"))
    }

    /// Object argument as its concrete type (forces proxies)
    pub fn object<T: Send + Sync + 'static>(&self, position: usize) -> Result<Arc<T>> {
        self.object_ref(position)?.downcast::<T>()
    }

    /// Object argument as a handle, without forcing a proxy
    pub fn object_ref(&self, position: usize) -> Result<ObjectRef> {
        match self.value(position)? {
            Value::Object(obj) => Ok(obj.clone()),
            other => Err(self.mismatch(position, "object", other)),
        }
    }

    /// Nullable object argument
    pub fn optional_object<T: Send + Sync + 'static>(
        &self,
        position: usize,
    ) -> Result<Option<Arc<T>>> {
        match self.value(position)? {
            Value::Null => Ok(None),
            Value::Object(obj) => obj.downcast::<T>().map(Some),
            other => Err(self.mismatch(position, "object or null", other)),
        }
    }

    pub fn string(&self, position: usize) -> Result<String> {
        match self.value(position)? {
            Value::Str(s) => Ok(s.clone()),
            other => Err(self.mismatch(position, "string", other)),
        }
    }

    pub fn int(&self, position: usize) -> Result<i64> {
        match self.value(position)? {
            Value::Int(i) => Ok(*i),
            Value::Str(s) => s
                .parse()
                .map_err(|_| DiError::invalid_argument(position, format!("'{s}' is not an int"))),
            other => Err(self.mismatch(position, "int", other)),
        }
    }

    pub fn float(&self, position: usize) -> Result<f64> {
        match self.value(position)? {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(self.mismatch(position, "float", other)),
        }
    }

    pub fn bool(&self, position: usize) -> Result<bool> {
        match self.value(position)? {
            Value::Bool(b) => Ok(*b),
            other => Err(self.mismatch(position, "bool", other)),
        }
    }

    pub fn list(&self, position: usize) -> Result<Vec<Value>> {
        match self.value(position)? {
            Value::List(items) => Ok(items.clone()),
            other => Err(self.mismatch(position, "list", other)),
        }
    }

    pub fn container(&self, position: usize) -> Result<Container> {
        match self.value(position)? {
            Value::Container(container) => Ok(container.clone()),
            other => Err(self.mismatch(position, "container", other)),
        }
    }

    fn mismatch(&self, position: usize, expected: &str, found: &Value) -> DiError {
        DiError::invalid_argument(
            position,
            format!("expected {expected}, got {}", found.type_name()),
        )
    }
}

// =============================================================================
// Class descriptors
// =============================================================================

type ConstructFn = Arc<dyn Fn(&Arguments) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;
type InvokeFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), &Arguments) -> Result<()> + Send + Sync>;
type AssignFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> Result<()> + Send + Sync>;
type RenderFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> String + Send + Sync>;

/// Whether a class can be instantiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Concrete,
    Abstract,
    Interface,
}

/// Injectable method of a class
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<ParamSpec>,
    invoke: InvokeFn,
}

impl MethodDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub(crate) fn invoke(&self, target: &mut (dyn Any + Send + Sync), args: &Arguments) -> Result<()> {
        (self.invoke)(target, args)
    }
}

/// Directly assignable property of a class
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    ty: ParamType,
    assign: AssignFn,
}

impl PropertyDescriptor {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    pub(crate) fn assign(&self, target: &mut (dyn Any + Send + Sync), value: Value) -> Result<()> {
        (self.assign)(target, value)
    }
}

/// Metadata for one class
#[derive(Clone)]
pub struct ClassDescriptor {
    name: String,
    kind: ClassKind,
    type_id: Option<TypeId>,
    constructor: Vec<ParamSpec>,
    construct: Option<ConstructFn>,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    render: Option<RenderFn>,
    method_injections: Vec<MethodInjection>,
    property_injections: PropertyInjections,
}

impl ClassDescriptor {
    /// Start describing a concrete class backed by the Rust type `T`
    pub fn builder<T: Send + Sync + 'static>(name: impl Into<String>) -> ClassBuilder<T> {
        ClassBuilder {
            descriptor: Self::bare(name.into(), ClassKind::Concrete, Some(TypeId::of::<T>())),
            _marker: std::marker::PhantomData,
        }
    }

    /// An interface: resolvable only through an explicit definition
    pub fn interface(name: impl Into<String>) -> Self {
        Self::bare(name.into(), ClassKind::Interface, None)
    }

    /// An abstract class: resolvable only through an explicit definition
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::bare(name.into(), ClassKind::Abstract, None)
    }

    fn bare(name: String, kind: ClassKind, type_id: Option<TypeId>) -> Self {
        Self {
            name,
            kind,
            type_id,
            constructor: Vec::new(),
            construct: None,
            methods: Vec::new(),
            properties: Vec::new(),
            render: None,
            method_injections: Vec::new(),
            property_injections: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// Concrete and has a constructor
    #[inline]
    pub fn is_instantiable(&self) -> bool {
        self.kind == ClassKind::Concrete && self.construct.is_some()
    }

    #[inline]
    pub fn constructor_params(&self) -> &[ParamSpec] {
        &self.constructor
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Method injections declared by attributes on the class
    #[inline]
    pub fn method_injections(&self) -> &[MethodInjection] {
        &self.method_injections
    }

    /// Property injections declared by attributes on the class
    #[inline]
    pub fn property_injections(&self) -> &PropertyInjections {
        &self.property_injections
    }

    pub(crate) fn construct(&self, args: &Arguments) -> Result<Box<dyn Any + Send + Sync>> {
        match &self.construct {
            Some(construct) => construct(args),
            None => Err(DiError::invalid_definition(
                &self.name,
                format!("class {} has no constructor", self.name),
            )),
        }
    }

    pub(crate) fn render(&self, instance: &(dyn Any + Send + Sync)) -> Option<String> {
        self.render.as_ref().map(|render| render(instance))
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("constructor", &self.constructor)
            .field(
                "methods",
                &self.methods.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "properties",
                &self.properties.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Typed builder for a [`ClassDescriptor`]
pub struct ClassBuilder<T> {
    descriptor: ClassDescriptor,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ClassBuilder<T> {
    /// Constructor signature and body
    pub fn constructor<F>(mut self, params: Vec<ParamSpec>, construct: F) -> Self
    where
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        self.descriptor.constructor = params;
        self.descriptor.construct = Some(Arc::new(move |args| {
            construct(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
        }));
        self
    }

    /// Injectable method
    pub fn method<F>(mut self, name: impl Into<String>, params: Vec<ParamSpec>, invoke: F) -> Self
    where
        F: Fn(&mut T, &Arguments) -> Result<()> + Send + Sync + 'static,
    {
        let class = self.descriptor.name.clone();
        self.descriptor.methods.push(MethodDescriptor {
            name: name.into(),
            params,
            invoke: Arc::new(move |target, args| invoke(downcast_target::<T>(&class, target)?, args)),
        });
        self
    }

    /// Assignable property
    pub fn property<F>(mut self, name: impl Into<String>, ty: ParamType, assign: F) -> Self
    where
        F: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let class = self.descriptor.name.clone();
        self.descriptor.properties.push(PropertyDescriptor {
            name: name.into(),
            ty,
            assign: Arc::new(move |target, value| {
                assign(downcast_target::<T>(&class, target)?, value)
            }),
        });
        self
    }

    /// String conversion used by [`ObjectRef::render`]
    pub fn display<F>(mut self, render: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let class = self.descriptor.name.clone();
        self.descriptor.render = Some(Arc::new(move |instance| match instance.downcast_ref::<T>() {
            Some(value) => render(value),
            None => class.clone(),
        }));
        self
    }

    /// Attribute-declared method injection (applied after construction)
    pub fn inject_method(mut self, method: impl Into<String>, args: ExplicitArgs) -> Self {
        self.descriptor.method_injections.push(MethodInjection {
            method: method.into(),
            args,
        });
        self
    }

    /// Attribute-declared property injection
    pub fn inject_property(mut self, property: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.descriptor
            .property_injections
            .push((property.into(), spec));
        self
    }

    pub fn build(self) -> ClassDescriptor {
        self.descriptor
    }
}

fn downcast_target<'a, T: 'static>(
    class: &str,
    target: &'a mut (dyn Any + Send + Sync),
) -> Result<&'a mut T> {
    target.downcast_mut::<T>().ok_or_else(|| DiError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: class.to_string(),
    })
}

// =============================================================================
// Registry
// =============================================================================

/// All classes known to the container, keyed by class name
#[derive(Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Arc<ClassDescriptor>, RandomState>,
    by_type: DashMap<TypeId, String, RandomState>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class
    pub fn register(&self, descriptor: ClassDescriptor) {
        if let Some(type_id) = descriptor.type_id {
            self.by_type.insert(type_id, descriptor.name.clone());
        }
        self.classes
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Descriptor registered for the Rust type `type_id`
    pub fn by_type(&self, type_id: TypeId) -> Option<Arc<ClassDescriptor>> {
        let name = self.by_type.get(&type_id)?.value().clone();
        self.get(&name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.classes.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Greeter {
        greeting: String,
        name: String,
    }

    fn greeter() -> ClassDescriptor {
        ClassDescriptor::builder::<Greeter>("Greeter")
            .constructor(vec![ParamSpec::scalar("greeting", "string")], |args| {
                Ok(Greeter {
                    greeting: args.string(0)?,
                    ..Default::default()
                })
            })
            .method("setName", vec![ParamSpec::new("name")], |this, args| {
                this.name = args.string(0)?;
                Ok(())
            })
            .property("name", ParamType::Scalar("string"), |this, value| {
                this.name = value.to_string();
                Ok(())
            })
            .display(|g| format!("{} {}", g.greeting, g.name))
            .build()
    }

    #[test]
    fn test_construct_and_invoke() {
        let descriptor = greeter();
        assert!(descriptor.is_instantiable());

        let mut object = descriptor
            .construct(&Arguments::new(vec![Value::from("hello")]))
            .unwrap();
        descriptor
            .method("setName")
            .unwrap()
            .invoke(&mut *object, &Arguments::new(vec![Value::from("bob")]))
            .unwrap();

        assert_eq!(descriptor.render(&*object).unwrap(), "hello bob");
    }

    #[test]
    fn test_property_assignment() {
        let descriptor = greeter();
        let mut object = descriptor
            .construct(&Arguments::new(vec![Value::from("hi")]))
            .unwrap();
        descriptor
            .property("name")
            .unwrap()
            .assign(&mut *object, Value::from("ann"))
            .unwrap();

        let greeter = object.downcast_ref::<Greeter>().unwrap();
        assert_eq!(greeter.name, "ann");
    }

    #[test]
    fn test_interfaces_are_not_instantiable() {
        assert!(!ClassDescriptor::interface("LoggerInterface").is_instantiable());
        assert!(!ClassDescriptor::abstract_class("BaseRepository").is_instantiable());
    }

    #[test]
    fn test_argument_type_errors() {
        let args = Arguments::new(vec![Value::Int(3)]);
        assert_eq!(args.int(0).unwrap(), 3);
        assert!(matches!(
            args.string(0),
            Err(DiError::InvalidArgument { position: 0, .. })
        ));
        assert!(args.value(4).is_err());
    }

    #[test]
    fn test_registry_lookup_by_type() {
        let registry = ClassRegistry::new();
        registry.register(greeter());
        registry.register(ClassDescriptor::interface("GreeterInterface"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("GreeterInterface"));
        assert_eq!(
            registry.by_type(TypeId::of::<Greeter>()).unwrap().name(),
            "Greeter"
        );
    }
}
