use std::fmt;

use im::Vector;

use crate::core::{Parameter, Row, RowData, SqlType, Value};

/// Ordered column → (value, SQL type) parts locating or linking a row.
///
/// Column names are unique. Values are persistent: `with_part` returns a new
/// identifier sharing the untouched parts with `self`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identifier {
    parts: Vector<Parameter>,
}

impl Identifier {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(name: impl Into<String>, value: Value, sql_type: SqlType) -> Self {
        Self::empty().with_part(name, value, sql_type)
    }

    /// Adds a part, replacing the value of an existing part with the same name.
    pub fn with_part(&self, name: impl Into<String>, value: Value, sql_type: SqlType) -> Self {
        let part = Parameter::new(name, value, sql_type);
        let mut parts = self.parts.clone();
        match parts.iter().position(|p| p.name == part.name) {
            Some(idx) => {
                parts.set(idx, part);
            }
            None => parts.push_back(part),
        }
        Self { parts }
    }

    pub fn parts(&self) -> impl Iterator<Item = &Parameter> {
        self.parts.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.parts.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn size(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn to_row_data(&self) -> RowData {
        let mut row = RowData::new();
        row.extend(self.parts.iter().cloned());
        row
    }

    /// True when every part equals the row's value for that column.
    pub fn matches(&self, row: &Row) -> bool {
        self.parts
            .iter()
            .all(|p| row.get(&p.name).is_some_and(|v| *v == p.value))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .parts
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_composition_identity() {
        let one = Identifier::empty().with_part("a", Value::Integer(1), SqlType::Integer);
        assert_eq!(one, Identifier::of("a", Value::Integer(1), SqlType::Integer));
        assert_eq!(one.size(), 1);
        assert!(Identifier::empty().is_empty());
    }

    #[test]
    fn test_with_part_replaces_same_name_and_keeps_order() {
        let id = Identifier::of("a", Value::Integer(1), SqlType::Integer)
            .with_part("b", Value::from("x"), SqlType::Text)
            .with_part("a", Value::Integer(2), SqlType::Integer);

        assert_eq!(id.column_names(), vec!["a", "b"]);
        assert_eq!(id.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_with_part_leaves_source_untouched() {
        let base = Identifier::of("a", Value::Integer(1), SqlType::Integer);
        let extended = base.with_part("b", Value::Integer(2), SqlType::Integer);

        assert_eq!(base.size(), 1);
        assert_eq!(extended.size(), 2);
    }

    #[test]
    fn test_matches_row() {
        let id = Identifier::of("lego_set", Value::Integer(7), SqlType::Integer)
            .with_part("lego_set_key", Value::Integer(0), SqlType::Integer);
        let mut row = Row::new();
        row.insert("lego_set".into(), Value::Integer(7));
        row.insert("lego_set_key".into(), Value::Integer(0));
        row.insert("content".into(), Value::from("intro"));
        assert!(id.matches(&row));

        row.insert("lego_set_key".into(), Value::Integer(1));
        assert!(!id.matches(&row));
        assert_eq!(id.to_string(), "{lego_set=7, lego_set_key=0}");
    }
}
