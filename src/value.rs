//! Runtime values produced by the resolver
//!
//! Everything the container hands out is a [`Value`]. Objects are carried as
//! [`ObjectRef`] handles, which are either a ready instance or a deferred
//! proxy that builds the instance on first access.

use crate::proxy::LazyProxy;
use crate::reflection::ClassDescriptor;
use crate::{Container, DiError, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased shared object instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A resolved value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The absence value bound to nullable parameters
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence (collections, variadic parameters)
    List(Vec<Value>),
    /// An object instance or a deferred proxy for one
    Object(ObjectRef),
    /// The live container, bound to parameters typed as the container
    Container(Container),
}

impl Value {
    /// Short name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Container(_) => "container",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Downcast an object value to its concrete type, initializing proxies.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        match self {
            Value::Object(obj) => obj.downcast::<T>(),
            other => Err(DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Container(a), Value::Container(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(obj) => write!(f, "{obj}"),
            Value::Container(_) => f.write_str("<container>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Object handles
// =============================================================================

pub(crate) enum Slot {
    Ready(Instance),
    Deferred(LazyProxy),
}

/// Handle to an object instance.
///
/// Cloning the handle shares the instance. A deferred handle runs its
/// initializer on the first access of any kind (`instance`, `downcast`,
/// `render`) and behaves like a ready handle afterwards.
#[derive(Clone)]
pub struct ObjectRef {
    class: Arc<str>,
    descriptor: Option<Arc<ClassDescriptor>>,
    slot: Arc<Slot>,
}

impl ObjectRef {
    /// Wrap an already constructed value
    pub fn new<T: Send + Sync + 'static>(class: impl Into<Arc<str>>, value: T) -> Self {
        Self::ready(class.into(), None, Arc::new(value))
    }

    pub(crate) fn ready(
        class: Arc<str>,
        descriptor: Option<Arc<ClassDescriptor>>,
        instance: Instance,
    ) -> Self {
        Self {
            class,
            descriptor,
            slot: Arc::new(Slot::Ready(instance)),
        }
    }

    pub(crate) fn deferred(
        class: Arc<str>,
        descriptor: Option<Arc<ClassDescriptor>>,
        proxy: LazyProxy,
    ) -> Self {
        Self {
            class,
            descriptor,
            slot: Arc::new(Slot::Deferred(proxy)),
        }
    }

    /// Name of the class this handle stands for
    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// True when the handle is a deferred proxy (initialized or not)
    #[inline]
    pub fn is_lazy(&self) -> bool {
        matches!(*self.slot, Slot::Deferred(_))
    }

    /// True once the underlying instance exists
    pub fn is_initialized(&self) -> bool {
        match &*self.slot {
            Slot::Ready(_) => true,
            Slot::Deferred(proxy) => proxy.is_initialized(),
        }
    }

    /// Get the underlying instance, running a pending initializer.
    pub fn instance(&self) -> Result<Instance> {
        match &*self.slot {
            Slot::Ready(instance) => Ok(Arc::clone(instance)),
            Slot::Deferred(proxy) => proxy.force(),
        }
    }

    /// Get the instance as `Arc<T>`
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.instance()?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.class.to_string(),
            })
    }

    /// Identity comparison.
    ///
    /// Two handles are identical when they share a slot, or when both have
    /// been initialized and point at the same instance. Never triggers
    /// initialization.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        if Arc::ptr_eq(&self.slot, &other.slot) {
            return true;
        }
        match (self.peek(), other.peek()) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// String conversion, running a pending initializer.
    pub fn render(&self) -> Result<String> {
        let instance = self.instance()?;
        Ok(self
            .descriptor
            .as_ref()
            .and_then(|d| d.render(instance.as_ref()))
            .unwrap_or_else(|| self.class.to_string()))
    }

    fn peek(&self) -> Option<Instance> {
        match &*self.slot {
            Slot::Ready(instance) => Some(Arc::clone(instance)),
            Slot::Deferred(proxy) => proxy.peek(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Ok(s) => f.write_str(&s),
            Err(err) => write!(f, "{} (uninitialized: {err})", self.class),
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("class", &self.class)
            .field("lazy", &self.is_lazy())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
