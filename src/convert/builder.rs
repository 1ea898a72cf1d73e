use serde_json::Value as JsonValue;

use crate::core::{DbError, Result, Value};
use crate::mapping::{AggregatePath, PropertyKind};

use super::converter::{EmbeddedIdDecomposition, RelationalConverter};
use super::identifier::Identifier;

/// Builder for [`Identifier`]s.
///
/// Every method returns a new builder; diverging `with_qualifier` calls made
/// from a shared prefix never see each other's parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierBuilder {
    identifier: Identifier,
}

impl IdentifierBuilder {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Identifier of the back-reference column in the table owned by `path`,
    /// holding `value`, the id of the path's id-defining parent.
    ///
    /// A single-property embedded id is unwrapped to its scalar; embedded ids
    /// with more properties are rejected.
    pub fn for_back_references<C>(converter: &C, path: &AggregatePath, value: &JsonValue) -> Result<Self>
    where
        C: RelationalConverter + ?Sized,
    {
        let id_property = path.id_defining_parent_path()?.required_id_property()?;

        let scalar = if !value.is_null() && id_property.is_embedded() {
            match converter.decompose_embedded_id(id_property, value)? {
                EmbeddedIdDecomposition::Single { value, .. } => value,
                EmbeddedIdDecomposition::TooManyProperties { entity, count } => {
                    return Err(DbError::MappingError(format!(
                        "Cannot back-reference '{}' from '{}': embedded id '{}' has {} properties, only one is supported",
                        path.id_defining_parent_path()?,
                        path,
                        entity,
                        count
                    )));
                }
            }
        } else {
            value.clone()
        };

        let sql_type = converter.column_type(id_property)?;
        let column = path.table_info().reverse_column_info()?.name();
        let value = converter.read_value(&scalar, sql_type)?;

        Ok(Self {
            identifier: Identifier::of(column, value, sql_type),
        })
    }

    /// Identifier of the id columns locating the row of the entity at `path`.
    ///
    /// Composite (multi-property embedded) ids yield one part per column.
    pub fn for_id<C>(converter: &C, path: &AggregatePath, value: &JsonValue) -> Result<Self>
    where
        C: RelationalConverter + ?Sized,
    {
        if value.is_null() {
            return Err(DbError::InvalidArgument(format!(
                "Id of '{}' must not be null",
                path
            )));
        }

        let id_property = path.required_id_property()?;
        let columns = path.table_info().id_column_infos();

        let identifier = match &id_property.kind {
            PropertyKind::Embedded { entity, .. } => {
                let embedded = converter.mapping_context().entity(entity)?;
                let object = value.as_object().ok_or_else(|| {
                    DbError::TypeMismatch(format!(
                        "Embedded id '{}' expects an object, got {}",
                        embedded.name, value
                    ))
                })?;
                let mut identifier = Identifier::empty();
                for (property, column) in embedded.properties.iter().zip(columns) {
                    let sql_type = converter.column_type(property)?;
                    let part = object.get(&property.name).unwrap_or(&JsonValue::Null);
                    let part = converter.read_value(part, sql_type)?;
                    if part.is_null() {
                        return Err(DbError::InvalidArgument(format!(
                            "Id part '{}' of '{}' must not be null",
                            property.name, path
                        )));
                    }
                    identifier = identifier.with_part(column.name(), part, sql_type);
                }
                identifier
            }
            _ => {
                let sql_type = converter.column_type(id_property)?;
                let column = path.table_info().single_id_column().ok_or_else(|| {
                    DbError::MappingError(format!("'{}' has no single id column", path))
                })?;
                Identifier::of(column.name(), converter.read_value(value, sql_type)?, sql_type)
            }
        };

        Ok(Self { identifier })
    }

    /// Adds the qualifier (map key or list index) of the collection at `path`.
    pub fn with_qualifier(&self, path: &AggregatePath, value: Value) -> Result<Self> {
        if value.is_null() {
            return Err(DbError::InvalidArgument(format!(
                "Qualifier value for '{}' must not be null",
                path
            )));
        }
        let info = path.table_info();
        let (Some(column), Some(sql_type)) =
            (info.qualifier_column_info(), info.qualifier_column_type())
        else {
            return Err(DbError::InvalidArgument(format!(
                "Path '{}' is not a list or map and takes no qualifier",
                path
            )));
        };

        Ok(Self {
            identifier: self.identifier.with_part(column.name(), value, sql_type),
        })
    }

    pub fn build(&self) -> Identifier {
        self.identifier.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::MappingRelationalConverter;
    use crate::core::SqlType;
    use crate::mapping::{EntityDescriptor, MappingContext};
    use serde_json::json;
    use std::sync::Arc;

    fn converter() -> MappingRelationalConverter {
        let context = MappingContext::builder()
            .register(
                EntityDescriptor::new("DummyEntity")
                    .id("id", SqlType::Integer)
                    .entity("child", "Child")
                    .list("children", "Child")
                    .map("named", "Child", SqlType::Text),
            )
            .register(EntityDescriptor::new("Child").property("name", SqlType::Text))
            .register(
                EntityDescriptor::new("Wrapped")
                    .embedded_id("pk", "WrappedPk")
                    .list("children", "Child"),
            )
            .register(EntityDescriptor::new("WrappedPk").property("id", SqlType::Integer))
            .register(
                EntityDescriptor::new("Pair")
                    .embedded_id("pk", "PairPk")
                    .list("children", "Child"),
            )
            .register(
                EntityDescriptor::new("PairPk")
                    .property("left", SqlType::Integer)
                    .property("right", SqlType::Integer),
            )
            .build()
            .unwrap();
        MappingRelationalConverter::new(Arc::new(context))
    }

    fn path(conv: &MappingRelationalConverter, root: &str, dotted: &str) -> AggregatePath {
        conv.context().path(root, dotted).unwrap()
    }

    #[test]
    fn test_parent_keys_for_single_child() {
        let conv = converter();
        let child = path(&conv, "DummyEntity", "child");

        let identifier = IdentifierBuilder::for_back_references(&conv, &child, &json!(4711))
            .unwrap()
            .build();

        assert_eq!(
            identifier,
            Identifier::of("dummy_entity", Value::Integer(4711), SqlType::Integer)
        );
    }

    #[test]
    fn test_parent_keys_with_list_index() {
        let conv = converter();
        let children = path(&conv, "DummyEntity", "children");

        let identifier = IdentifierBuilder::for_back_references(&conv, &children, &json!(4711))
            .unwrap()
            .with_qualifier(&children, Value::Integer(23))
            .unwrap()
            .build();

        assert_eq!(identifier.column_names(), vec!["dummy_entity", "dummy_entity_key"]);
        assert_eq!(identifier.get("dummy_entity_key"), Some(&Value::Integer(23)));
    }

    #[test]
    fn test_parent_keys_with_map_key() {
        let conv = converter();
        let named = path(&conv, "DummyEntity", "named");

        let identifier = IdentifierBuilder::for_back_references(&conv, &named, &json!(4711))
            .unwrap()
            .with_qualifier(&named, Value::from("map-key-eins"))
            .unwrap()
            .build();

        assert_eq!(identifier.size(), 2);
        assert_eq!(
            identifier.get("dummy_entity_key"),
            Some(&Value::from("map-key-eins"))
        );
    }

    #[test]
    fn test_null_parent_id_is_kept() {
        let conv = converter();
        let child = path(&conv, "DummyEntity", "child");

        let identifier = IdentifierBuilder::for_back_references(&conv, &child, &JsonValue::Null)
            .unwrap()
            .build();
        assert_eq!(identifier.get("dummy_entity"), Some(&Value::Null));
    }

    #[test]
    fn test_embedded_id_unwraps_to_scalar() {
        let conv = converter();
        let children = path(&conv, "Wrapped", "children");

        let from_embedded =
            IdentifierBuilder::for_back_references(&conv, &children, &json!({ "id": 23 }))
                .unwrap()
                .build();
        let from_scalar = IdentifierBuilder::for_back_references(&conv, &children, &json!(23))
            .unwrap()
            .build();

        assert_eq!(from_embedded, from_scalar);
        assert_eq!(
            from_embedded,
            Identifier::of("wrapped", Value::Integer(23), SqlType::Integer)
        );
    }

    #[test]
    fn test_two_property_embedded_id_cannot_be_back_referenced() {
        let conv = converter();
        let children = path(&conv, "Pair", "children");

        let result = IdentifierBuilder::for_back_references(
            &conv,
            &children,
            &json!({ "left": 1, "right": 2 }),
        );
        assert!(matches!(result, Err(DbError::MappingError(_))));
    }

    #[test]
    fn test_qualifier_rejects_null_and_unqualified_paths() {
        let conv = converter();
        let children = path(&conv, "DummyEntity", "children");
        let child = path(&conv, "DummyEntity", "child");
        let base = IdentifierBuilder::for_back_references(&conv, &children, &json!(1)).unwrap();

        assert!(matches!(
            base.with_qualifier(&children, Value::Null),
            Err(DbError::InvalidArgument(_))
        ));
        assert!(matches!(
            base.with_qualifier(&child, Value::Integer(0)),
            Err(DbError::InvalidArgument(_))
        ));
        assert_eq!(base.build().size(), 1);
    }

    #[test]
    fn test_diverging_branches_do_not_alias() {
        let conv = converter();
        let children = path(&conv, "DummyEntity", "children");
        let base = IdentifierBuilder::for_back_references(&conv, &children, &json!(1)).unwrap();

        let first = base.with_qualifier(&children, Value::Integer(0)).unwrap();
        let second = base.with_qualifier(&children, Value::Integer(1)).unwrap();

        assert_eq!(first.build().get("dummy_entity_key"), Some(&Value::Integer(0)));
        assert_eq!(second.build().get("dummy_entity_key"), Some(&Value::Integer(1)));
        assert_eq!(base.build().size(), 1);
    }

    #[test]
    fn test_for_id_with_embedded_id() {
        let conv = converter();
        let root = conv.context().root_path("Wrapped").unwrap();

        let identifier = IdentifierBuilder::for_id(&conv, &root, &json!({ "id": 23 }))
            .unwrap()
            .build();
        assert_eq!(identifier, Identifier::of("id", Value::Integer(23), SqlType::Integer));
        assert!(matches!(
            IdentifierBuilder::for_id(&conv, &root, &JsonValue::Null),
            Err(DbError::InvalidArgument(_))
        ));
    }
}
