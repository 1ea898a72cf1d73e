use std::collections::BTreeMap;

use super::{SqlType, Value};

/// A row as returned by a data-access strategy, keyed by column name.
pub type Row = BTreeMap<String, Value>;

/// A named value with the SQL type it should be bound as.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub sql_type: SqlType,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Value, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            value,
            sql_type,
        }
    }
}

/// Ordered column values for one INSERT or UPDATE.
///
/// Column names are unique; setting an existing column replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowData {
    columns: Vec<Parameter>,
}

impl RowData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, parameter: Parameter) {
        match self.columns.iter_mut().find(|c| c.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => self.columns.push(parameter),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value, sql_type: SqlType) -> Self {
        self.set(Parameter::new(name, value, sql_type));
        self
    }

    pub fn extend(&mut self, parameters: impl IntoIterator<Item = Parameter>) {
        for parameter in parameters {
            self.set(parameter);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    pub fn columns(&self) -> &[Parameter] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Back-reference from a child table to the table holding its parent's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_data_replaces_existing_column() {
        let mut row = RowData::new()
            .with("name", Value::from("alpha"), SqlType::Text)
            .with("age", Value::Integer(3), SqlType::Integer);
        row.set(Parameter::new("name", Value::from("beta"), SqlType::Text));

        assert_eq!(row.len(), 2);
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["name", "age"]);
        assert_eq!(row.get("name"), Some(&Value::from("beta")));
    }
}
