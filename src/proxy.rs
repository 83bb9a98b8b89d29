//! Lazy proxy bridge
//!
//! A deferred handle stores an initializer and builds the real instance the
//! first time anything touches it. Initialization uses
//! `OnceCell::get_or_try_init`, so a successful initializer runs at most once
//! while a failed one leaves the cell empty and is retried on the next access.

use crate::reflection::ClassDescriptor;
use crate::value::{Instance, ObjectRef};
use crate::{DiError, Result, Value};
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Type-erased deferred initializer
pub(crate) type Initializer = Box<dyn Fn() -> Result<Instance> + Send + Sync>;

thread_local! {
    /// Proxies currently running their initializer on this thread
    static FORCING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Deferred construction cell behind a lazy [`ObjectRef`]
pub(crate) struct LazyProxy {
    class: Arc<str>,
    init: Initializer,
    instance: OnceCell<Instance>,
}

impl LazyProxy {
    pub(crate) fn new(class: Arc<str>, init: Initializer) -> Self {
        Self {
            class,
            init,
            instance: OnceCell::new(),
        }
    }

    #[inline]
    pub(crate) fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<Instance> {
        self.instance.get().map(Arc::clone)
    }

    /// Get the instance, running the initializer if needed.
    pub(crate) fn force(&self) -> Result<Instance> {
        if let Some(instance) = self.instance.get() {
            #[cfg(feature = "logging")]
            trace!(
                target: "autowire",
                class = &*self.class,
                "Lazy proxy already initialized"
            );
            return Ok(Arc::clone(instance));
        }

        // Re-entering the same cell from its own initializer would block forever.
        let _guard = ForcingGuard::enter(self as *const Self as usize).ok_or_else(|| {
            DiError::CircularDependency {
                chain: vec![self.class.to_string(), self.class.to_string()],
            }
        })?;

        self.instance
            .get_or_try_init(|| {
                #[cfg(feature = "logging")]
                debug!(
                    target: "autowire",
                    class = &*self.class,
                    "Lazy proxy initializing on first access"
                );

                (self.init)()
            })
            .map(Arc::clone)
    }
}

struct ForcingGuard;

impl ForcingGuard {
    fn enter(key: usize) -> Option<Self> {
        FORCING.with(|forcing| {
            let mut forcing = forcing.borrow_mut();
            if forcing.contains(&key) {
                return None;
            }
            forcing.push(key);
            Some(ForcingGuard)
        })
    }
}

impl Drop for ForcingGuard {
    fn drop(&mut self) {
        FORCING.with(|forcing| {
            forcing.borrow_mut().pop();
        });
    }
}

/// Create a deferred handle that stands in for an instance of `class`.
///
/// `initializer` runs on the first access of the returned handle.
pub fn create_deferred<F>(
    class: impl Into<Arc<str>>,
    descriptor: Option<Arc<ClassDescriptor>>,
    initializer: F,
) -> ObjectRef
where
    F: Fn() -> Result<Instance> + Send + Sync + 'static,
{
    let class = class.into();

    #[cfg(feature = "logging")]
    debug!(
        target: "autowire",
        class = &*class,
        "Creating lazy proxy"
    );

    let proxy = LazyProxy::new(Arc::clone(&class), Box::new(initializer));
    ObjectRef::deferred(class, descriptor, proxy)
}

/// Unwrap a resolved value into the instance a proxy needs.
pub(crate) fn instance_of(id: &str, value: Value) -> Result<Instance> {
    match value {
        Value::Object(obj) => obj.instance(),
        other => Err(DiError::invalid_definition(
            id,
            format!(
                "a lazy entry must produce an object, got {}",
                other.type_name()
            ),
        )),
    }
}
