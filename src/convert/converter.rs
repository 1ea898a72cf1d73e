//! Conversion between aggregate documents and column values.
//!
//! Aggregates travel through the engine in their `serde_json` form; the
//! converter decides how each document value is bound to a column and how a
//! column value is written back into a document.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Number, Value as JsonValue};
use uuid::Uuid;

use crate::core::{DbError, Result, SqlType, Value};
use crate::mapping::{MappingContext, PropertyDescriptor, PropertyKind};

/// Outcome of unwrapping an embedded id into the scalar used as a back-reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedIdDecomposition {
    /// The embedded type has exactly one property.
    Single { property: String, value: JsonValue },
    /// The embedded type has more properties than a single back-reference column can hold.
    TooManyProperties { entity: String, count: usize },
}

pub trait RelationalConverter {
    fn mapping_context(&self) -> &MappingContext;

    /// SQL type a property's value is bound as. Embedded ids resolve to their single scalar.
    fn column_type(&self, property: &PropertyDescriptor) -> Result<SqlType>;

    fn decompose_embedded_id(
        &self,
        property: &PropertyDescriptor,
        value: &JsonValue,
    ) -> Result<EmbeddedIdDecomposition>;

    /// Document value → column value.
    fn read_value(&self, json: &JsonValue, sql_type: SqlType) -> Result<Value>;

    /// Column value → document value.
    /// Fails for floats JSON cannot represent (NaN, infinities).
    fn write_value(&self, value: &Value) -> Result<JsonValue>;

    /// Map key (always a string in documents) → qualifier value.
    fn read_key(&self, key: &str, sql_type: SqlType) -> Result<Value>;

    /// Qualifier value → map key.
    fn write_key(&self, value: &Value) -> Result<String>;
}

/// Converter driven by the registered entity descriptors.
#[derive(Debug, Clone)]
pub struct MappingRelationalConverter {
    context: Arc<MappingContext>,
}

impl MappingRelationalConverter {
    pub fn new(context: Arc<MappingContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<MappingContext> {
        &self.context
    }
}

impl RelationalConverter for MappingRelationalConverter {
    fn mapping_context(&self) -> &MappingContext {
        &self.context
    }

    fn column_type(&self, property: &PropertyDescriptor) -> Result<SqlType> {
        match &property.kind {
            PropertyKind::Simple { sql_type } => Ok(*sql_type),
            PropertyKind::Embedded { entity, .. } => {
                let embedded = self.context.entity(entity)?;
                match embedded.properties.as_slice() {
                    [single] => single.sql_type().ok_or_else(|| {
                        DbError::MappingError(format!(
                            "Property '{}' of embedded '{}' is not a simple column",
                            single.name, embedded.name
                        ))
                    }),
                    other => Err(DbError::MappingError(format!(
                        "Embedded '{}' has {} properties; only single-property embeddeds map to one column",
                        embedded.name,
                        other.len()
                    ))),
                }
            }
            _ => Err(DbError::MappingError(format!(
                "Property '{}' is stored in its own table and has no column type",
                property.name
            ))),
        }
    }

    fn decompose_embedded_id(
        &self,
        property: &PropertyDescriptor,
        value: &JsonValue,
    ) -> Result<EmbeddedIdDecomposition> {
        let PropertyKind::Embedded { entity, .. } = &property.kind else {
            return Err(DbError::MappingError(format!(
                "Property '{}' is not embedded",
                property.name
            )));
        };
        let embedded = self.context.entity(entity)?;

        match embedded.properties.as_slice() {
            [single] => {
                let object = value.as_object().ok_or_else(|| {
                    DbError::TypeMismatch(format!(
                        "Embedded id '{}' expects an object, got {}",
                        embedded.name, value
                    ))
                })?;
                Ok(EmbeddedIdDecomposition::Single {
                    property: single.name.clone(),
                    value: object.get(&single.name).cloned().unwrap_or(JsonValue::Null),
                })
            }
            properties => Ok(EmbeddedIdDecomposition::TooManyProperties {
                entity: embedded.name.clone(),
                count: properties.len(),
            }),
        }
    }

    fn read_value(&self, json: &JsonValue, sql_type: SqlType) -> Result<Value> {
        match (json, sql_type) {
            (JsonValue::Null, _) => Ok(Value::Null),

            (JsonValue::Bool(b), SqlType::Boolean) => Ok(Value::Boolean(*b)),

            (JsonValue::Number(n), SqlType::Integer) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| DbError::TypeMismatch(format!("Cannot convert {} to INTEGER", n))),

            (JsonValue::Number(n), SqlType::Float) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| DbError::TypeMismatch(format!("Cannot convert {} to FLOAT", n))),

            (JsonValue::String(s), SqlType::Text) => Ok(Value::Text(s.clone())),

            (JsonValue::String(s), SqlType::Timestamp) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| DbError::TypeMismatch(format!("Invalid TIMESTAMP '{}': {}", s, e))),

            (JsonValue::String(s), SqlType::Uuid) => Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| DbError::TypeMismatch(format!("Invalid UUID '{}': {}", s, e))),

            _ => Err(DbError::TypeMismatch(format!(
                "Cannot convert {} to {}",
                json, sql_type
            ))),
        }
    }

    fn write_value(&self, value: &Value) -> Result<JsonValue> {
        Ok(match value {
            Value::Null => JsonValue::Null,
            Value::Integer(i) => JsonValue::Number(Number::from(*i)),
            Value::Float(f) => Number::from_f64(*f).map(JsonValue::Number).ok_or_else(|| {
                DbError::TypeMismatch(format!("FLOAT value {} cannot be written to a document", f))
            })?,
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Timestamp(t) => JsonValue::String(t.to_rfc3339()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
        })
    }

    fn read_key(&self, key: &str, sql_type: SqlType) -> Result<Value> {
        match sql_type {
            SqlType::Integer => key
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| DbError::TypeMismatch(format!("Map key '{}' is not an INTEGER", key))),
            SqlType::Boolean => key
                .parse::<bool>()
                .map(Value::Boolean)
                .map_err(|_| DbError::TypeMismatch(format!("Map key '{}' is not a BOOLEAN", key))),
            SqlType::Float => key
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| DbError::TypeMismatch(format!("Map key '{}' is not a FLOAT", key))),
            other => self.read_value(&JsonValue::String(key.to_string()), other),
        }
    }

    fn write_key(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null => Err(DbError::InvalidArgument(
                "Map key must not be NULL".to_string(),
            )),
            Value::Text(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Timestamp(t) => Ok(t.to_rfc3339()),
            Value::Uuid(u) => Ok(u.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::EntityDescriptor;
    use serde_json::json;

    fn converter() -> MappingRelationalConverter {
        let context = MappingContext::builder()
            .register(EntityDescriptor::new("WrappedPk").property("id", SqlType::Integer))
            .register(
                EntityDescriptor::new("TwoPartPk")
                    .property("region", SqlType::Text)
                    .property("number", SqlType::Integer),
            )
            .build()
            .unwrap();
        MappingRelationalConverter::new(Arc::new(context))
    }

    #[test]
    fn test_single_property_embedded_decomposes() {
        let conv = converter();
        let property = PropertyDescriptor::embedded("pk", "WrappedPk").as_id();

        let decomposed = conv
            .decompose_embedded_id(&property, &json!({ "id": 23 }))
            .unwrap();
        assert_eq!(
            decomposed,
            EmbeddedIdDecomposition::Single {
                property: "id".into(),
                value: json!(23)
            }
        );
        assert_eq!(conv.column_type(&property).unwrap(), SqlType::Integer);
    }

    #[test]
    fn test_multi_property_embedded_reports_count() {
        let conv = converter();
        let property = PropertyDescriptor::embedded("pk", "TwoPartPk").as_id();

        let decomposed = conv
            .decompose_embedded_id(&property, &json!({ "region": "eu", "number": 1 }))
            .unwrap();
        assert_eq!(
            decomposed,
            EmbeddedIdDecomposition::TooManyProperties {
                entity: "TwoPartPk".into(),
                count: 2
            }
        );
        assert!(matches!(
            conv.column_type(&property),
            Err(DbError::MappingError(_))
        ));
    }

    #[test]
    fn test_read_and_write_values() {
        let conv = converter();
        assert_eq!(
            conv.read_value(&json!(5), SqlType::Integer).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            conv.read_value(&json!(5), SqlType::Float).unwrap(),
            Value::Float(5.0)
        );
        assert!(matches!(
            conv.read_value(&json!("5"), SqlType::Integer),
            Err(DbError::TypeMismatch(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(
            conv.read_value(&json!(id.to_string()), SqlType::Uuid).unwrap(),
            Value::Uuid(id)
        );
        assert_eq!(conv.write_value(&Value::from("alpha")).unwrap(), json!("alpha"));
        assert_eq!(conv.write_value(&Value::Null).unwrap(), JsonValue::Null);
        assert_eq!(conv.write_value(&Value::Float(1.5)).unwrap(), json!(1.5));
    }

    #[test]
    fn test_non_finite_floats_are_not_written() {
        let conv = converter();
        assert!(matches!(
            conv.write_value(&Value::Float(f64::NAN)),
            Err(DbError::TypeMismatch(_))
        ));
        assert!(matches!(
            conv.write_value(&Value::Float(f64::INFINITY)),
            Err(DbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_map_keys() {
        let conv = converter();
        assert_eq!(
            conv.read_key("3", SqlType::Integer).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            conv.read_key("north", SqlType::Text).unwrap(),
            Value::from("north")
        );
        assert_eq!(conv.write_key(&Value::Integer(3)).unwrap(), "3");
        assert!(conv.write_key(&Value::Null).is_err());
    }
}
