use serde_json::{Map, Value as JsonValue};

use crate::access::DataAccessStrategy;
use crate::convert::{IdentifierBuilder, MappingRelationalConverter, RelationalConverter};
use crate::core::{DbError, Result, Row, Value};
use crate::mapping::{AggregatePath, MappingContext, OnEmpty, PropertyKind};

use super::document::{id_document, is_empty_value};
use super::writer::Qualifiers;

/// Rebuilds aggregate documents from a root row and the child tables below it.
pub(crate) struct AggregateReader<'a, S: DataAccessStrategy + ?Sized> {
    converter: &'a MappingRelationalConverter,
    strategy: &'a S,
}

impl<'a, S: DataAccessStrategy + ?Sized> AggregateReader<'a, S> {
    pub(crate) fn new(converter: &'a MappingRelationalConverter, strategy: &'a S) -> Self {
        Self { converter, strategy }
    }

    fn context(&self) -> &'a MappingContext {
        self.converter.context()
    }

    pub(crate) fn read(&self, root: &AggregatePath, row: &Row) -> Result<JsonValue> {
        self.read_entity(root, row, &JsonValue::Null, &Vec::new())
    }

    fn read_entity(
        &self,
        path: &AggregatePath,
        row: &Row,
        base: &JsonValue,
        qualifiers: &Qualifiers,
    ) -> Result<JsonValue> {
        let mut object = Map::new();
        if path.is_root() || path.has_id_property() {
            let own_id = id_document(self.converter, path, row)?;
            self.fill(path, row, &mut object, &own_id, &Vec::new())?;
        } else {
            self.fill(path, row, &mut object, base, qualifiers)?;
        }
        Ok(JsonValue::Object(object))
    }

    fn fill(
        &self,
        path: &AggregatePath,
        row: &Row,
        object: &mut Map<String, JsonValue>,
        base: &JsonValue,
        qualifiers: &Qualifiers,
    ) -> Result<()> {
        for child in self.context().child_paths(path) {
            let property = child.required_leaf_property()?;
            let value = match &property.kind {
                PropertyKind::Simple { .. } => {
                    let column = child.column_info()?.name();
                    self.converter
                        .write_value(row.get(column).unwrap_or(&Value::Null))?
                }
                PropertyKind::Embedded { on_empty, .. } => {
                    let mut nested = Map::new();
                    self.fill(child, row, &mut nested, base, qualifiers)?;
                    if *on_empty == OnEmpty::UseNull && nested.values().all(is_empty_value) {
                        JsonValue::Null
                    } else {
                        JsonValue::Object(nested)
                    }
                }
                PropertyKind::Entity { .. } => {
                    let rows = self.child_rows(child, base, qualifiers, None)?;
                    match rows.first() {
                        Some(first) => self.read_entity(child, first, base, qualifiers)?,
                        None => JsonValue::Null,
                    }
                }
                PropertyKind::List { .. } => {
                    let mut elements = Vec::new();
                    for (key, element_row) in self.qualified_rows(child, base, qualifiers)? {
                        let mut nested = qualifiers.clone();
                        nested.push((child.clone(), key));
                        elements.push(self.read_entity(child, &element_row, base, &nested)?);
                    }
                    JsonValue::Array(elements)
                }
                PropertyKind::Map { .. } => {
                    let mut entries = Map::new();
                    for (key, element_row) in self.qualified_rows(child, base, qualifiers)? {
                        let name = self.converter.write_key(&key)?;
                        let mut nested = qualifiers.clone();
                        nested.push((child.clone(), key));
                        entries.insert(name, self.read_entity(child, &element_row, base, &nested)?);
                    }
                    JsonValue::Object(entries)
                }
            };
            object.insert(property.name.clone(), value);
        }
        Ok(())
    }

    /// Rows of a list or map with their qualifier values, in qualifier order.
    fn qualified_rows(
        &self,
        path: &AggregatePath,
        base: &JsonValue,
        qualifiers: &Qualifiers,
    ) -> Result<Vec<(Value, Row)>> {
        let column = path
            .table_info()
            .qualifier_column_info()
            .ok_or_else(|| DbError::MappingError(format!("'{}' has no qualifier column", path)))?
            .name();

        let rows = self.child_rows(path, base, qualifiers, Some(column))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get(column).cloned().unwrap_or(Value::Null), row))
            .collect())
    }

    fn child_rows(
        &self,
        path: &AggregatePath,
        base: &JsonValue,
        qualifiers: &Qualifiers,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>> {
        let mut builder = IdentifierBuilder::for_back_references(self.converter, path, base)?;
        for (qualified, value) in qualifiers {
            builder = builder.with_qualifier(qualified, value.clone())?;
        }
        self.strategy.find_all_by_identifier(
            path.table_info().qualified_table_name(),
            &builder.build(),
            order_by,
        )
    }
}
