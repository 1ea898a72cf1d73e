use std::cmp::Ordering;

use serde_json::Value as JsonValue;

use crate::access::{DataAccessStrategy, IdGeneration};
use crate::convert::{Identifier, IdentifierBuilder, MappingRelationalConverter, RelationalConverter};
use crate::core::{DbError, Parameter, Result, RowData, SqlType, Value};
use crate::mapping::{AggregatePath, MappingContext, PropertyKind};

use super::deleter::AggregateDeleter;
use super::document::{property, set_property};

/// Qualifiers collected on the way down through id-less collection elements.
pub(crate) type Qualifiers = Vec<(AggregatePath, Value)>;

/// Turns an aggregate document into INSERT/UPDATE statements.
///
/// Parents are written before their children. Every write is preceded by a
/// validation pass over the whole document, so shape and type errors surface
/// before the first statement.
pub(crate) struct AggregateWriter<'a, S: DataAccessStrategy + ?Sized> {
    converter: &'a MappingRelationalConverter,
    strategy: &'a S,
}

impl<'a, S: DataAccessStrategy + ?Sized> AggregateWriter<'a, S> {
    pub(crate) fn new(converter: &'a MappingRelationalConverter, strategy: &'a S) -> Self {
        Self { converter, strategy }
    }

    fn context(&self) -> &'a MappingContext {
        self.converter.context()
    }

    pub(crate) fn insert_root(&self, root: &AggregatePath, document: &mut JsonValue) -> Result<()> {
        self.validate(root, document)?;

        let entity = root.required_leaf_entity()?;
        if let Some(version) = entity.version_property() {
            set_property(document, &version.name, JsonValue::from(0))?;
        }

        let id = self.insert_row(root, document, &Identifier::empty())?;
        self.insert_children(root, document, &id, &Vec::new())
    }

    /// Updates the root row, then replaces every owned child row.
    pub(crate) fn update_root(&self, root: &AggregatePath, document: &mut JsonValue) -> Result<()> {
        let entity = root.required_leaf_entity()?;
        let id_property = root.required_id_property()?;
        let id = property(document, &id_property.name).clone();
        if id.is_null() {
            return Err(DbError::InvalidArgument(format!(
                "Cannot update '{}' without an id",
                entity.name
            )));
        }
        self.validate(root, document)?;

        let identifier = IdentifierBuilder::for_id(self.converter, root, &id)?.build();
        let deleter = AggregateDeleter::new(self.converter, self.strategy);
        let stale_children = deleter.plan(root, &id)?;
        let mut row = self.row_data(root, document)?;
        for column in identifier.column_names() {
            row.remove(column);
        }
        let table = root.table_info().qualified_table_name();

        match entity.version_property() {
            Some(version) => {
                let column = self
                    .context()
                    .path(&entity.name, &version.name)?
                    .column_info()?
                    .name()
                    .to_string();
                let current = self
                    .converter
                    .read_value(property(document, &version.name), SqlType::Integer)?
                    .as_i64()
                    .ok_or_else(|| {
                        DbError::InvalidArgument(format!(
                            "Cannot update '{}' with id {}: version '{}' is not set",
                            entity.name, identifier, version.name
                        ))
                    })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    DbError::ConstraintViolation(format!(
                        "Version of aggregate '{}' with id {} cannot be incremented past {}",
                        entity.name, identifier, current
                    ))
                })?;
                row.set(Parameter::new(column.clone(), Value::Integer(next), SqlType::Integer));
                let expected = Parameter::new(column, Value::Integer(current), SqlType::Integer);

                if !self
                    .strategy
                    .update_with_version(table, &identifier, &row, &expected)?
                {
                    return Err(DbError::OptimisticLockingFailure(format!(
                        "Aggregate '{}' with id {} is not at version {}",
                        entity.name, identifier, current
                    )));
                }
                set_property(document, &version.name, JsonValue::from(next))?;
            }
            None => {
                let updated = if row.is_empty() {
                    self.strategy.exists_by_id(table, &identifier)?
                } else {
                    self.strategy.update(table, &identifier, &row)?
                };
                if !updated {
                    return Err(DbError::IncorrectUpdateSemantics(format!(
                        "Failed to update aggregate '{}' with id {}: no such row",
                        entity.name, identifier
                    )));
                }
            }
        }

        deleter.execute(&stale_children)?;
        self.insert_children(root, document, &id, &Vec::new())
    }

    /// Inserts the row of the entity at `path` and returns its id document
    /// (`null` for id-less entities). Generated ids are written back into `element`.
    fn insert_row(
        &self,
        path: &AggregatePath,
        element: &mut JsonValue,
        parent_keys: &Identifier,
    ) -> Result<JsonValue> {
        let entity = path.required_leaf_entity()?;
        let mut row = self.row_data(path, element)?;

        let generation = match entity.id_property() {
            Some(id) if property(element, &id.name).is_null() => {
                let column = path.table_info().single_id_column().ok_or_else(|| {
                    DbError::InvalidArgument(format!(
                        "Composite id of '{}' must be assigned before insert",
                        path
                    ))
                })?;
                row.remove(column.name());
                Some(IdGeneration::new(column.name(), self.converter.column_type(id)?))
            }
            _ => None,
        };

        let generated = self.strategy.insert(
            path.table_info().qualified_table_name(),
            &row,
            parent_keys,
            generation.as_ref(),
        )?;

        let Some(id) = entity.id_property() else {
            return Ok(JsonValue::Null);
        };
        if let Some(value) = generated {
            set_property(element, &id.name, self.converter.write_value(&value)?)?;
        }
        Ok(property(element, &id.name).clone())
    }

    /// Inserts everything stored in tables below `path`, in declaration order.
    pub(crate) fn insert_children(
        &self,
        path: &AggregatePath,
        object: &mut JsonValue,
        base: &JsonValue,
        qualifiers: &Qualifiers,
    ) -> Result<()> {
        for child in self.context().child_paths(path) {
            let property = child.required_leaf_property()?;
            let Some(value) = object.get_mut(&property.name) else {
                continue;
            };

            match &property.kind {
                PropertyKind::Simple { .. } => {}
                PropertyKind::Embedded { .. } => {
                    self.insert_children(child, value, base, qualifiers)?;
                }
                PropertyKind::Entity { .. } => {
                    if !value.is_null() {
                        self.insert_element(child, value, base, qualifiers.clone())?;
                    }
                }
                PropertyKind::List { .. } => {
                    let JsonValue::Array(elements) = value else {
                        continue;
                    };
                    for (index, element) in elements.iter_mut().enumerate() {
                        let mut nested = qualifiers.clone();
                        nested.push((child.clone(), Value::Integer(index as i64)));
                        self.insert_element(child, element, base, nested)?;
                    }
                }
                PropertyKind::Map { key_type, .. } => {
                    let JsonValue::Object(entries) = value else {
                        continue;
                    };
                    let mut keyed = Vec::with_capacity(entries.len());
                    for (key, element) in entries.iter_mut() {
                        keyed.push((self.converter.read_key(key, *key_type)?, element));
                    }
                    keyed.sort_by(|a, b| a.0.compare(&b.0).unwrap_or(Ordering::Equal));

                    for (key, element) in keyed {
                        let mut nested = qualifiers.clone();
                        nested.push((child.clone(), key));
                        self.insert_element(child, element, base, nested)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Inserts one child entity. Elements with an id of their own become the
    /// base of their descendants; id-less elements hand down the inherited base
    /// together with their qualifiers.
    fn insert_element(
        &self,
        path: &AggregatePath,
        element: &mut JsonValue,
        base: &JsonValue,
        qualifiers: Qualifiers,
    ) -> Result<()> {
        let mut builder = IdentifierBuilder::for_back_references(self.converter, path, base)?;
        for (qualified, value) in &qualifiers {
            builder = builder.with_qualifier(qualified, value.clone())?;
        }
        let parent_keys = builder.build();

        let id = self.insert_row(path, element, &parent_keys)?;
        if path.has_id_property() {
            self.insert_children(path, element, &id, &Vec::new())
        } else {
            self.insert_children(path, element, base, &qualifiers)
        }
    }

    /// Column values of the table owned by `path`, embedded columns included.
    pub(crate) fn row_data(&self, path: &AggregatePath, object: &JsonValue) -> Result<RowData> {
        let mut row = RowData::new();
        self.collect_columns(path, object, &mut row)?;
        Ok(row)
    }

    fn collect_columns(&self, path: &AggregatePath, object: &JsonValue, row: &mut RowData) -> Result<()> {
        for child in self.context().child_paths(path) {
            let property = child.required_leaf_property()?;
            let value = super::document::property(object, &property.name);
            match &property.kind {
                PropertyKind::Simple { sql_type } => {
                    let value = self.converter.read_value(value, *sql_type)?;
                    row.set(Parameter::new(child.column_info()?.name(), value, *sql_type));
                }
                PropertyKind::Embedded { .. } => self.collect_columns(child, value, row)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Checks the whole document against the mapping without touching the store.
    fn validate(&self, root: &AggregatePath, document: &JsonValue) -> Result<()> {
        root.required_id_property()?;
        if !document.is_object() {
            return Err(DbError::TypeMismatch(format!(
                "Aggregate '{}' must be an object, got {}",
                root, document
            )));
        }
        self.validate_id_assignable(root, document)?;
        self.row_data(root, document)?;
        self.validate_children(root, document)
    }

    fn validate_id_assignable(&self, path: &AggregatePath, element: &JsonValue) -> Result<()> {
        let Some(id) = path.leaf_entity().and_then(|e| e.id_property()) else {
            return Ok(());
        };
        if !property(element, &id.name).is_null() {
            return Ok(());
        }
        match id.sql_type() {
            Some(sql_type) if sql_type.is_generatable() => Ok(()),
            _ => Err(DbError::InvalidArgument(format!(
                "Id '{}' of '{}' must be assigned before insert; only INTEGER and UUID ids are generated",
                id.name, path
            ))),
        }
    }

    fn validate_children(&self, path: &AggregatePath, object: &JsonValue) -> Result<()> {
        for child in self.context().child_paths(path) {
            let property = child.required_leaf_property()?;
            let value = super::document::property(object, &property.name);
            if value.is_null() {
                continue;
            }

            let elements: Vec<&JsonValue> = match (&property.kind, value) {
                (PropertyKind::Simple { .. }, _) => continue,
                (PropertyKind::Embedded { .. }, _) => {
                    self.validate_children(child, value)?;
                    continue;
                }
                (PropertyKind::Entity { .. }, _) => vec![value],
                (PropertyKind::List { .. }, JsonValue::Array(items)) => items.iter().collect(),
                (PropertyKind::Map { key_type, .. }, JsonValue::Object(entries)) => {
                    for key in entries.keys() {
                        self.converter.read_key(key, *key_type)?;
                    }
                    entries.values().collect()
                }
                _ => {
                    return Err(DbError::TypeMismatch(format!(
                        "'{}' expects a {}, got {}",
                        child,
                        if child.is_list() { "list" } else { "map" },
                        value
                    )));
                }
            };

            for element in elements {
                if element.is_null() && child.is_multi_valued() {
                    return Err(DbError::InvalidArgument(format!(
                        "'{}' contains a null element; collections must not hold nulls",
                        child
                    )));
                }
                if !element.is_object() {
                    return Err(DbError::TypeMismatch(format!(
                        "Elements of '{}' must be objects, got {}",
                        child, element
                    )));
                }
                self.validate_id_assignable(child, element)?;
                self.row_data(child, element)?;
                self.validate_children(child, element)?;
            }
        }
        Ok(())
    }
}
