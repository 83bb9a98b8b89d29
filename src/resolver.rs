//! Definition resolvers
//!
//! One resolver per definition kind, dispatched with a `match` rather than
//! trait objects. Resolvers never cache: scope is applied by the container.

use crate::binder::{self, resolve_argument};
use crate::definition::{
    AliasDefinition, ArgKey, ArgumentSpec, CollectionDefinition, DecoratorDefinition, Definition,
    EnvironmentDefinition, FactoryDefinition, MethodInjection, ObjectDefinition,
};
use crate::proxy::{self, instance_of};
use crate::reflection::{Arguments, ClassDescriptor, ParamType};
use crate::value::{Instance, ObjectRef};
use crate::{Container, DiError, Result, Value};
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Resolve a definition into a value
#[inline]
pub(crate) fn resolve(container: &Container, definition: &Definition) -> Result<Value> {
    resolve_with(container, definition, &[])
}

/// Resolve with explicit arguments that take precedence over the definition's own
pub(crate) fn resolve_with(
    container: &Container,
    definition: &Definition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Value> {
    #[cfg(feature = "logging")]
    trace!(
        target: "autowire",
        id = definition.id(),
        kind = definition.kind_name(),
        "Resolving definition"
    );

    match definition {
        Definition::Value(d) => Ok(d.value.clone()),
        Definition::Alias(d) => resolve_alias(container, d),
        Definition::Environment(d) => resolve_environment(container, d),
        Definition::Collection(d) => resolve_collection(container, d),
        Definition::Factory(d) => resolve_factory(container, d, overrides),
        Definition::Object(d) => resolve_object(container, d, overrides),
        Definition::Decorator(d) => resolve_decorator(container, d, overrides),
    }
}

// =============================================================================
// Simple kinds
// =============================================================================

fn resolve_alias(container: &Container, definition: &AliasDefinition) -> Result<Value> {
    container.get(&definition.target).map_err(|err| {
        err.map_root(|root| match root {
            DiError::NotFound { id } if id == definition.target => DiError::AliasTargetMissing {
                alias: definition.id.clone(),
                target: id,
            },
            other => other,
        })
    })
}

fn resolve_environment(container: &Container, definition: &EnvironmentDefinition) -> Result<Value> {
    if let Some(value) = container.environment().var(&definition.variable) {
        return Ok(Value::Str(value));
    }

    match &definition.default {
        Some(default) => {
            #[cfg(feature = "logging")]
            debug!(
                target: "autowire",
                id = definition.id.as_str(),
                variable = definition.variable.as_str(),
                "Environment variable not set, using default"
            );
            resolve_argument(container, default, &definition.id)
        }
        None => Err(DiError::EnvironmentVariable {
            variable: definition.variable.clone(),
            id: definition.id.clone(),
        }),
    }
}

fn resolve_collection(container: &Container, definition: &CollectionDefinition) -> Result<Value> {
    definition
        .entries
        .iter()
        .map(|entry| resolve_argument(container, entry, &definition.id))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn resolve_decorator(
    container: &Container,
    definition: &DecoratorDefinition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Value> {
    let inner = definition.inner.as_deref().ok_or_else(|| {
        DiError::invalid_definition(&definition.id, "decorator has no definition to decorate")
    })?;
    let value = resolve_with(container, inner, overrides)?;
    definition.decorate(value, container)
}

// =============================================================================
// Factories
// =============================================================================

fn resolve_factory(
    container: &Container,
    definition: &FactoryDefinition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Value> {
    if !definition.lazy {
        return call_factory(container, definition, overrides);
    }

    let class = definition
        .class_hint
        .clone()
        .unwrap_or_else(|| definition.id.clone());
    let descriptor = container.classes().get(&class);
    let container = container.downgrade();
    let definition = definition.clone();
    let overrides = overrides.to_vec();

    Ok(Value::Object(proxy::create_deferred(
        class,
        descriptor,
        move || {
            let container = container.upgrade(&definition.id)?;
            let value = call_factory(&container, &definition, &overrides)?;
            instance_of(&definition.id, value)
        },
    )))
}

fn call_factory(
    container: &Container,
    definition: &FactoryDefinition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Value> {
    let callable = &definition.callable;
    let values = binder::bind(
        container,
        callable.params(),
        overrides,
        &definition.parameters,
        callable.name(),
        &definition.id,
    )?;
    callable.invoke(&Arguments::new(values))
}

// =============================================================================
// Objects
// =============================================================================

fn resolve_object(
    container: &Container,
    definition: &ObjectDefinition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Value> {
    let descriptor = instantiable_class(container, definition)?;
    let class: Arc<str> = Arc::from(definition.class_name.as_str());

    if definition.lazy {
        let container = container.downgrade();
        let definition = definition.clone();
        let overrides = overrides.to_vec();
        let target = Arc::clone(&descriptor);

        return Ok(Value::Object(proxy::create_deferred(
            class,
            Some(descriptor),
            move || {
                let container = container.upgrade(&definition.id)?;
                build_object(&container, &target, &definition, &overrides)
            },
        )));
    }

    let instance = build_object(container, &descriptor, definition, overrides)?;
    Ok(Value::Object(ObjectRef::ready(class, Some(descriptor), instance)))
}

fn instantiable_class(
    container: &Container,
    definition: &ObjectDefinition,
) -> Result<Arc<ClassDescriptor>> {
    let descriptor = container.classes().get(&definition.class_name).ok_or_else(|| {
        DiError::invalid_definition(
            &definition.id,
            format!("class {} does not exist", definition.class_name),
        )
    })?;

    if !descriptor.is_instantiable() {
        return Err(DiError::invalid_definition(
            &definition.id,
            format!("class {} is not instantiable", definition.class_name),
        ));
    }

    Ok(descriptor)
}

/// Bind the constructor, construct, then run method and property injections
fn build_object(
    container: &Container,
    descriptor: &ClassDescriptor,
    definition: &ObjectDefinition,
    overrides: &[(ArgKey, ArgumentSpec)],
) -> Result<Instance> {
    let callable = format!("{}::new", descriptor.name());
    let values = binder::bind(
        container,
        descriptor.constructor_params(),
        overrides,
        &definition.constructor_args,
        &callable,
        &definition.id,
    )?;

    let mut object = descriptor.construct(&Arguments::new(values))?;

    inject_members(
        container,
        descriptor,
        &mut *object,
        &definition.id,
        &definition.method_injections,
        &definition.property_injections,
    )?;

    #[cfg(feature = "logging")]
    debug!(
        target: "autowire",
        id = definition.id.as_str(),
        class = descriptor.name(),
        "Object constructed"
    );

    Ok(Arc::from(object))
}

/// Run method injections in order, then assign properties
pub(crate) fn inject_members(
    container: &Container,
    descriptor: &ClassDescriptor,
    target: &mut (dyn Any + Send + Sync),
    id: &str,
    methods: &[MethodInjection],
    properties: &[(String, ArgumentSpec)],
) -> Result<()> {
    for injection in methods {
        let method = descriptor.method(&injection.method).ok_or_else(|| {
            DiError::invalid_definition(
                id,
                format!("method {}::{} does not exist", descriptor.name(), injection.method),
            )
        })?;
        let callable = format!("{}::{}", descriptor.name(), method.name());
        let values = binder::bind(container, method.params(), &[], &injection.args, &callable, id)?;
        method.invoke(target, &Arguments::new(values))?;
    }

    for (name, spec) in properties {
        let property = descriptor.property(name).ok_or_else(|| {
            DiError::invalid_definition(
                id,
                format!("property {}::{} does not exist", descriptor.name(), name),
            )
        })?;
        let value = match (spec, property.ty()) {
            (ArgumentSpec::Unset, ParamType::Class(class)) => container.get(class)?,
            (ArgumentSpec::Unset, _) => {
                return Err(DiError::invalid_definition(
                    id,
                    format!(
                        "property {}::{} has no class type to inject",
                        descriptor.name(),
                        name
                    ),
                ));
            }
            (spec, _) => resolve_argument(container, spec, id)?,
        };
        property.assign(target, value)?;
    }

    Ok(())
}
