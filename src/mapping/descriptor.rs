//! Explicit entity descriptions.
//!
//! An aggregate's shape is declared once, either through the builder methods
//! on [`EntityDescriptor`] or by deserializing a schema document, and then
//! registered into a [`MappingContext`](super::MappingContext).

use serde::{Deserialize, Serialize};

use crate::core::SqlType;

/// How an embedded entity is read back when all of its columns are NULL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnEmpty {
    #[default]
    UseNull,
    UseEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    /// A single column.
    Simple { sql_type: SqlType },
    /// Another entity flattened into the owning table.
    Embedded {
        entity: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        on_empty: OnEmpty,
    },
    /// An owned one-to-one child stored in its own table.
    Entity { entity: String },
    /// An owned ordered collection; the element index is the qualifier.
    List { entity: String },
    /// An owned keyed collection; the map key is the qualifier.
    Map { entity: String, key_type: SqlType },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub version: bool,
    /// Column name override for simple properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Back-reference column override for child tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    /// Qualifier column override for lists and maps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,
}

impl PropertyDescriptor {
    fn with_kind(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            id: false,
            version: false,
            column: None,
            id_column: None,
            key_column: None,
        }
    }

    pub fn simple(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self::with_kind(name, PropertyKind::Simple { sql_type })
    }

    pub fn embedded(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            PropertyKind::Embedded {
                entity: entity.into(),
                prefix: String::new(),
                on_empty: OnEmpty::UseNull,
            },
        )
    }

    pub fn entity(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::with_kind(name, PropertyKind::Entity { entity: entity.into() })
    }

    pub fn list(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::with_kind(name, PropertyKind::List { entity: entity.into() })
    }

    pub fn map(name: impl Into<String>, entity: impl Into<String>, key_type: SqlType) -> Self {
        Self::with_kind(
            name,
            PropertyKind::Map {
                entity: entity.into(),
                key_type,
            },
        )
    }

    /// Marks the property as the entity's identifier.
    pub fn as_id(mut self) -> Self {
        self.id = true;
        self
    }

    /// Marks the property as the optimistic-locking version.
    pub fn as_version(mut self) -> Self {
        self.version = true;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Column prefix for an embedded property; ignored for other kinds.
    pub fn prefix(mut self, value: impl Into<String>) -> Self {
        if let PropertyKind::Embedded { prefix, .. } = &mut self.kind {
            *prefix = value.into();
        }
        self
    }

    pub fn on_empty(mut self, value: OnEmpty) -> Self {
        if let PropertyKind::Embedded { on_empty, .. } = &mut self.kind {
            *on_empty = value;
        }
        self
    }

    /// Entity referenced by an embedded, entity, list or map property.
    pub fn target_entity(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Simple { .. } => None,
            PropertyKind::Embedded { entity, .. }
            | PropertyKind::Entity { entity }
            | PropertyKind::List { entity }
            | PropertyKind::Map { entity, .. } => Some(entity),
        }
    }

    pub fn sql_type(&self) -> Option<SqlType> {
        match &self.kind {
            PropertyKind::Simple { sql_type } => Some(*sql_type),
            _ => None,
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, PropertyKind::Simple { .. })
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, PropertyKind::Embedded { .. })
    }

    /// True for properties whose values live in a table of their own.
    pub fn is_table_backed(&self) -> bool {
        matches!(
            self.kind,
            PropertyKind::Entity { .. } | PropertyKind::List { .. } | PropertyKind::Map { .. }
        )
    }

    pub fn is_qualified(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. } | PropertyKind::Map { .. })
    }

    /// Type of the qualifier column: INTEGER for list indexes, the declared key type for maps.
    pub fn qualifier_type(&self) -> Option<SqlType> {
        match &self.kind {
            PropertyKind::List { .. } => Some(SqlType::Integer),
            PropertyKind::Map { key_type, .. } => Some(*key_type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            properties: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn id(self, name: &str, sql_type: SqlType) -> Self {
        self.with_property(PropertyDescriptor::simple(name, sql_type).as_id())
    }

    pub fn embedded_id(self, name: &str, entity: &str) -> Self {
        self.with_property(PropertyDescriptor::embedded(name, entity).as_id())
    }

    pub fn version(self, name: &str) -> Self {
        self.with_property(PropertyDescriptor::simple(name, SqlType::Integer).as_version())
    }

    pub fn property(self, name: &str, sql_type: SqlType) -> Self {
        self.with_property(PropertyDescriptor::simple(name, sql_type))
    }

    pub fn embedded(self, name: &str, entity: &str, prefix: &str) -> Self {
        self.with_property(PropertyDescriptor::embedded(name, entity).prefix(prefix))
    }

    pub fn entity(self, name: &str, entity: &str) -> Self {
        self.with_property(PropertyDescriptor::entity(name, entity))
    }

    pub fn list(self, name: &str, entity: &str) -> Self {
        self.with_property(PropertyDescriptor::list(name, entity))
    }

    pub fn map(self, name: &str, entity: &str, key_type: SqlType) -> Self {
        self.with_property(PropertyDescriptor::map(name, entity, key_type))
    }

    pub fn property_named(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn id_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.id)
    }

    pub fn version_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.version)
    }

    pub fn has_id_property(&self) -> bool {
        self.id_property().is_some()
    }
}
