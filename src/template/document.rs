//! Helpers for aggregates in their `serde_json` document form.

use serde_json::{Map, Value as JsonValue};

use crate::convert::RelationalConverter;
use crate::core::{DbError, Result, Row, Value};
use crate::mapping::{AggregatePath, PropertyKind};

static NULL: JsonValue = JsonValue::Null;

/// Property of a document object; `null` when absent or when `object` is not an object.
pub(crate) fn property<'v>(object: &'v JsonValue, name: &str) -> &'v JsonValue {
    object.get(name).unwrap_or(&NULL)
}

pub(crate) fn set_property(object: &mut JsonValue, name: &str, value: JsonValue) -> Result<()> {
    match object.as_object_mut() {
        Some(map) => {
            map.insert(name.to_string(), value);
            Ok(())
        }
        None => Err(DbError::TypeMismatch(format!(
            "Cannot set '{}' on non-object value {}",
            name, object
        ))),
    }
}

/// Id of the entity at `path` as it appears in a document, read from its row.
///
/// Embedded ids come back as objects so they round-trip through
/// [`IdentifierBuilder`](crate::convert::IdentifierBuilder).
pub(crate) fn id_document<C>(converter: &C, path: &AggregatePath, row: &Row) -> Result<JsonValue>
where
    C: RelationalConverter + ?Sized,
{
    let id_property = path.required_id_property()?;
    let columns = path.table_info().id_column_infos();
    let column_value = |name: &str| converter.write_value(row.get(name).unwrap_or(&Value::Null));

    match &id_property.kind {
        PropertyKind::Embedded { entity, .. } => {
            let embedded = converter.mapping_context().entity(entity)?;
            let object = embedded
                .properties
                .iter()
                .zip(columns)
                .map(|(p, c)| Ok((p.name.clone(), column_value(c.name())?)))
                .collect::<Result<Map<String, JsonValue>>>()?;
            Ok(JsonValue::Object(object))
        }
        _ => match columns {
            [column] => column_value(column.name()),
            _ => Err(DbError::MappingError(format!(
                "'{}' has no single id column",
                path
            ))),
        },
    }
}

/// True for `null`, empty arrays, and objects made only of such values.
pub(crate) fn is_empty_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.values().all(is_empty_value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_defaults_to_null() {
        let doc = json!({ "name": "alpha" });
        assert_eq!(property(&doc, "name"), &json!("alpha"));
        assert!(property(&doc, "missing").is_null());
        assert!(property(&JsonValue::Null, "name").is_null());
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&json!({ "a": null, "b": [], "c": { "d": null } })));
        assert!(!is_empty_value(&json!({ "a": 0 })));
        assert!(!is_empty_value(&json!({ "a": [1] })));
    }

    #[test]
    fn test_set_property_requires_object() {
        let mut doc = json!({});
        set_property(&mut doc, "id", json!(1)).unwrap();
        assert_eq!(doc, json!({ "id": 1 }));

        let mut scalar = json!(3);
        assert!(matches!(
            set_property(&mut scalar, "id", json!(1)),
            Err(DbError::TypeMismatch(_))
        ));
    }
}
