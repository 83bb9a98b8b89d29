//! Parameter binding
//!
//! Maps the declared parameters of a constructor, method or factory onto
//! concrete values. For each parameter, in declaration order:
//!
//! 1. an explicit argument (by name, then by position)
//! 2. the container or the requested identifier, for parameters typed as such
//! 3. the declared class, when the container can build it
//! 4. the default value
//! 5. null, when the parameter is nullable
//!
//! and otherwise fails with a [`DiError::Binding`].

use crate::definition::{ArgKey, ArgumentSpec};
use crate::reflection::{ParamSpec, ParamType};
use crate::{resolver, Container, DiError, Result, Value};
use std::collections::BTreeMap;

#[cfg(feature = "logging")]
use tracing::trace;

/// Explicit arguments in lookup order: call-site overrides, then the
/// definition's own arguments
type Layers<'a> = [&'a [(ArgKey, ArgumentSpec)]; 2];

/// Bind `params` of `callable` for the entry `requested_id`.
///
/// `overrides` are consulted completely, by name then by position, before
/// `explicit`.
pub(crate) fn bind(
    container: &Container,
    params: &[ParamSpec],
    overrides: &[(ArgKey, ArgumentSpec)],
    explicit: &[(ArgKey, ArgumentSpec)],
    callable: &str,
    requested_id: &str,
) -> Result<Vec<Value>> {
    let layers: Layers<'_> = [overrides, explicit];
    let mut values = Vec::with_capacity(params.len());

    for (position, param) in params.iter().enumerate() {
        if param.variadic {
            values.push(bind_variadic(container, param, position, &layers, requested_id)?);
            // Variadic parameters are always last.
            break;
        }

        if let Some(spec) = explicit_for(&layers, &param.name, position) {
            values.push(resolve_argument(container, spec, requested_id)?);
            continue;
        }

        values.push(bind_implicit(container, param, position, callable, requested_id)?);
    }

    Ok(values)
}

fn bind_implicit(
    container: &Container,
    param: &ParamSpec,
    position: usize,
    callable: &str,
    requested_id: &str,
) -> Result<Value> {
    match &param.ty {
        ParamType::Container => return Ok(Value::Container(container.clone())),
        ParamType::RequestedEntry => return Ok(Value::Str(requested_id.to_string())),
        ParamType::Class(class) if container.has(class) => {
            #[cfg(feature = "logging")]
            trace!(
                target: "autowire",
                parameter = param.name.as_str(),
                class = class.as_str(),
                callable = callable,
                "Autowiring parameter by type"
            );
            return container.get(class);
        }
        _ => {}
    }

    if let Some(default) = &param.default {
        return Ok(default.clone());
    }
    if param.nullable {
        return Ok(Value::Null);
    }

    Err(DiError::binding(&param.name, position, callable))
}

/// Collect the remaining positional arguments into a list
fn bind_variadic(
    container: &Container,
    param: &ParamSpec,
    position: usize,
    layers: &Layers<'_>,
    requested_id: &str,
) -> Result<Value> {
    // Lower layers first so an override replaces the same position.
    let mut positional: BTreeMap<usize, &ArgumentSpec> = BTreeMap::new();
    for layer in layers.iter().rev() {
        for (key, spec) in layer.iter() {
            match key {
                ArgKey::Position(p) if *p >= position => {
                    positional.insert(*p, spec);
                }
                _ => {}
            }
        }
    }

    if positional.is_empty() {
        // A named argument for the variadic parameter supplies the whole list.
        if let Some(spec) = explicit_for(layers, &param.name, usize::MAX) {
            return match resolve_argument(container, spec, requested_id)? {
                list @ Value::List(_) => Ok(list),
                single => Ok(Value::List(vec![single])),
            };
        }
    }

    let items = positional
        .into_values()
        .filter(|spec| !matches!(spec, ArgumentSpec::Unset))
        .map(|spec| resolve_argument(container, spec, requested_id))
        .collect::<Result<Vec<_>>>()?;

    Ok(Value::List(items))
}

/// Explicit argument for a parameter. Each layer is searched by name, then
/// by position, before the next layer. `Unset` counts as absent.
fn explicit_for<'a>(
    layers: &Layers<'a>,
    name: &str,
    position: usize,
) -> Option<&'a ArgumentSpec> {
    layers.iter().copied().find_map(|layer| {
        let usable = |spec: &&ArgumentSpec| !matches!(spec, ArgumentSpec::Unset);
        let by_name = layer.iter().find_map(|(key, spec)| match key {
            ArgKey::Name(n) if n == name => Some(spec),
            _ => None,
        });
        by_name.filter(usable).or_else(|| {
            layer
                .iter()
                .find_map(|(key, spec)| match key {
                    ArgKey::Position(p) if *p == position => Some(spec),
                    _ => None,
                })
                .filter(usable)
        })
    })
}

/// Turn an argument spec into a value
pub(crate) fn resolve_argument(
    container: &Container,
    spec: &ArgumentSpec,
    context_id: &str,
) -> Result<Value> {
    match spec {
        ArgumentSpec::Literal(value) => Ok(value.clone()),
        ArgumentSpec::Link(id) => container.get(id),
        ArgumentSpec::Nested(definition) => resolver::resolve(container, definition),
        ArgumentSpec::Unset => Err(DiError::invalid_definition(
            context_id,
            "an entry left to autowiring has nothing to autowire from",
        )),
    }
}
