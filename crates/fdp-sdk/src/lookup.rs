//! Entity lookups that turn empty results into `EntityNotFound`.

use fdp_registry::{RegistryClient, RegistryError};
use fdp_types::{RegistryObjectRef, Table};
use serde_json::{Map, Value};

use crate::error::{Entity, SdkError, SdkResult};

/// Build a filter map from `(key, value)` pairs.
pub(crate) fn filters<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// First match of a query, or `EntityNotFound`.
pub(crate) fn require_first(
    client: &RegistryClient,
    table: Table,
    filters: &Map<String, Value>,
    entity: Entity,
    detail: impl Into<String>,
) -> SdkResult<Value> {
    client
        .query_first(table, filters)?
        .ok_or_else(|| SdkError::not_found(entity, detail))
}

/// The reference held in `field` of `value`.
pub(crate) fn field_ref(value: &Value, field: &str, entity: Entity) -> SdkResult<RegistryObjectRef> {
    let url = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::not_found(entity, format!("no `{field}` on {}", describe(value))))?;
    Ok(RegistryObjectRef::parse(url)?)
}

/// First entry of the `components` list of an object.
pub(crate) fn first_component(object: &Value) -> SdkResult<RegistryObjectRef> {
    let url = object
        .get("components")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(Value::as_str)
        .ok_or_else(|| {
            SdkError::not_found(Entity::ObjectComponent, format!("{} has no components", describe(object)))
        })?;
    Ok(RegistryObjectRef::parse(url)?)
}

/// GET an entity; a 404 becomes `EntityNotFound`.
pub(crate) fn fetch(client: &RegistryClient, target: &RegistryObjectRef, entity: Entity) -> SdkResult<Value> {
    match client.get_ref(target) {
        Ok(value) => Ok(value),
        Err(RegistryError::UnexpectedStatus { actual: 404, .. }) => {
            Err(SdkError::not_found(entity, target.uri().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// A string field of an entity.
pub(crate) fn text_field<'a>(value: &'a Value, field: &str, entity: Entity) -> SdkResult<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::not_found(entity, format!("no `{field}` on {}", describe(value))))
}

fn describe(value: &Value) -> String {
    value
        .get("url")
        .and_then(Value::as_str)
        .unwrap_or("entity")
        .to_string()
}
