use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use log::debug;
use uuid::Uuid;

use crate::convert::Identifier;
use crate::core::{DbError, ForeignKey, Parameter, Result, Row, RowData, SqlType, Value};
use crate::mapping::MappingContext;
use crate::sql::SqlGenerator;

use super::strategy::{DataAccessStrategy, IdGeneration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
}

/// One executed statement as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub kind: StatementKind,
    pub table: String,
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub affected: usize,
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: BTreeMap<String, MemoryTable>,
    journal: Vec<JournalEntry>,
}

impl StoreState {
    fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    fn record(
        &mut self,
        kind: StatementKind,
        table: &str,
        sql: String,
        parameters: Vec<Parameter>,
        affected: usize,
    ) {
        debug!("{} [{} row(s)]", sql, affected);
        self.journal.push(JournalEntry {
            kind,
            table: table.to_string(),
            sql,
            parameters,
            affected,
        });
    }
}

/// Table storage held in memory, for tests and tooling.
///
/// Tables are created on first insert. Primary keys and back-reference
/// foreign keys are only checked when declared, either explicitly or through
/// [`for_context`](Self::for_context).
#[derive(Debug, Default)]
pub struct InMemoryDataAccessStrategy {
    state: Mutex<StoreState>,
    primary_keys: HashMap<String, Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
    generator: SqlGenerator,
}

impl InMemoryDataAccessStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the primary keys of every mapped entity and, unless
    /// disabled in the mapping config, the back-reference foreign keys.
    pub fn for_context(context: &MappingContext) -> Self {
        let mut store = Self::new();
        for (table, columns) in context.primary_keys() {
            store.primary_keys.insert(table, columns);
        }
        if context.config().enforce_foreign_keys {
            store.foreign_keys = context.foreign_keys();
        }
        store
    }

    pub fn with_primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.primary_keys.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_foreign_key(mut self, key: ForeignKey) -> Self {
        self.foreign_keys.push(key);
        self
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Statements executed so far, oldest first.
    pub fn journal(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.state.lock()?.journal.clone())
    }

    pub fn clear_journal(&self) -> Result<()> {
        self.state.lock()?.journal.clear();
        Ok(())
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.state.lock()?.rows(table).to_vec())
    }

    fn check_types(table: &str, data: &RowData) -> Result<()> {
        for column in data.columns() {
            if !column.sql_type.is_compatible(&column.value) {
                return Err(DbError::TypeMismatch(format!(
                    "Column '{}.{}' expects {}, got {}",
                    table,
                    column.name,
                    column.sql_type,
                    column.value.type_name()
                )));
            }
        }
        Ok(())
    }

    fn check_primary_key(&self, state: &StoreState, table: &str, row: &Row) -> Result<()> {
        let Some(columns) = self.primary_keys.get(table) else {
            return Ok(());
        };
        for column in columns {
            if row.get(column).is_none_or(Value::is_null) {
                return Err(DbError::ConstraintViolation(format!(
                    "NULL value in primary key column '{}' of '{}'",
                    column, table
                )));
            }
        }
        let duplicate = state
            .rows(table)
            .iter()
            .any(|existing| columns.iter().all(|c| existing.get(c) == row.get(c)));
        if duplicate {
            let key: Vec<String> = columns
                .iter()
                .map(|c| format!("{}={}", c, row.get(c).unwrap_or(&Value::Null)))
                .collect();
            return Err(DbError::ConstraintViolation(format!(
                "Duplicate primary key ({}) in '{}'",
                key.join(", "),
                table
            )));
        }
        Ok(())
    }

    fn check_references(&self, state: &StoreState, table: &str, row: &Row) -> Result<()> {
        for fk in self.foreign_keys.iter().filter(|fk| fk.table == table) {
            let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = state
                .rows(&fk.referenced_table)
                .iter()
                .any(|r| r.get(&fk.referenced_column) == Some(value));
            if !exists {
                return Err(DbError::ConstraintViolation(format!(
                    "Foreign key violation: Value {} in '{}.{}' references non-existent key in '{}.{}'",
                    value, fk.table, fk.column, fk.referenced_table, fk.referenced_column
                )));
            }
        }
        Ok(())
    }

    fn check_not_referenced(&self, state: &StoreState, table: &str, removed: &[Row]) -> Result<()> {
        for fk in self.foreign_keys.iter().filter(|fk| fk.referenced_table == table) {
            for row in removed {
                let Some(key) = row.get(&fk.referenced_column).filter(|v| !v.is_null()) else {
                    continue;
                };
                let referenced = state
                    .rows(&fk.table)
                    .iter()
                    .any(|child| child.get(&fk.column) == Some(key));
                if referenced {
                    return Err(DbError::ConstraintViolation(format!(
                        "Delete on '{}' violates foreign key constraint: key {} is still referenced from '{}.{}'",
                        table, key, fk.table, fk.column
                    )));
                }
            }
        }
        Ok(())
    }

    fn remove_matching(
        &self,
        state: &mut StoreState,
        table: &str,
        predicate: impl Fn(&Row) -> bool,
    ) -> Result<usize> {
        let removed: Vec<Row> = state
            .rows(table)
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }
        self.check_not_referenced(state, table, &removed)?;
        if let Some(t) = state.tables.get_mut(table) {
            t.rows.retain(|r| !predicate(r));
        }
        Ok(removed.len())
    }

    fn update_matching(
        state: &mut StoreState,
        table: &str,
        row: &RowData,
        predicate: impl Fn(&Row) -> bool,
    ) -> usize {
        let Some(t) = state.tables.get_mut(table) else {
            return 0;
        };
        let mut affected = 0;
        for existing in t.rows.iter_mut().filter(|r| predicate(r)) {
            for column in row.columns() {
                existing.insert(column.name.clone(), column.value.clone());
            }
            affected += 1;
        }
        affected
    }
}

fn sort_rows(rows: &mut [Row], column: &str) -> Result<()> {
    let mut failure = None;
    rows.sort_by(|a, b| {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        match left.compare(right) {
            Ok(ordering) => ordering,
            Err(err) => {
                failure.get_or_insert(err);
                Ordering::Equal
            }
        }
    });
    failure.map_or(Ok(()), Err)
}

fn expected_parameter(expected: &Parameter) -> Parameter {
    Parameter::new(
        SqlGenerator::expected_version_marker(&expected.name),
        expected.value.clone(),
        expected.sql_type,
    )
}

impl DataAccessStrategy for InMemoryDataAccessStrategy {
    fn insert(
        &self,
        table: &str,
        row: &RowData,
        parent_keys: &Identifier,
        id_generation: Option<&IdGeneration>,
    ) -> Result<Option<Value>> {
        let mut data = parent_keys.to_row_data();
        data.extend(row.columns().iter().cloned());
        Self::check_types(table, &data)?;

        let column_names: Vec<&str> = data.column_names().collect();
        let sql = self.generator.insert(table, &column_names);

        let mut state = self.state.lock()?;
        let generated = match id_generation {
            Some(generation) => {
                let value = match generation.sql_type {
                    SqlType::Integer => {
                        let t = state.tables.entry(table.to_string()).or_default();
                        t.next_id = t.next_id.checked_add(1).ok_or_else(|| {
                            DbError::ConstraintViolation(format!(
                                "Id sequence of '{}' is exhausted",
                                table
                            ))
                        })?;
                        Value::Integer(t.next_id)
                    }
                    SqlType::Uuid => Value::Uuid(Uuid::new_v4()),
                    other => {
                        return Err(DbError::UnsupportedOperation(format!(
                            "Cannot generate {} values for '{}.{}'",
                            other, table, generation.column
                        )));
                    }
                };
                data.set(Parameter::new(
                    generation.column.clone(),
                    value.clone(),
                    generation.sql_type,
                ));
                Some(value)
            }
            None => None,
        };

        let record: Row = data
            .columns()
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        self.check_primary_key(&state, table, &record)?;
        self.check_references(&state, table, &record)?;

        let t = state.tables.entry(table.to_string()).or_default();
        if let Some(columns) = self.primary_keys.get(table)
            && let [column] = columns.as_slice()
            && let Some(Value::Integer(id)) = record.get(column)
        {
            t.next_id = t.next_id.max(*id);
        }
        t.rows.push(record);

        state.record(StatementKind::Insert, table, sql, data.columns().to_vec(), 1);
        Ok(generated)
    }

    fn update(&self, table: &str, id: &Identifier, row: &RowData) -> Result<bool> {
        Self::check_types(table, row)?;
        let columns: Vec<&str> = row.column_names().collect();
        let sql = self.generator.update(table, &columns, &id.column_names());

        let mut state = self.state.lock()?;
        let affected = Self::update_matching(&mut state, table, row, |r| id.matches(r));

        let mut parameters = row.columns().to_vec();
        parameters.extend(id.parts().cloned());
        state.record(StatementKind::Update, table, sql, parameters, affected);
        Ok(affected > 0)
    }

    fn update_with_version(
        &self,
        table: &str,
        id: &Identifier,
        row: &RowData,
        expected: &Parameter,
    ) -> Result<bool> {
        Self::check_types(table, row)?;
        let columns: Vec<&str> = row.column_names().collect();
        let sql = self
            .generator
            .update_with_version(table, &columns, &id.column_names(), &expected.name);

        let mut state = self.state.lock()?;
        let affected = Self::update_matching(&mut state, table, row, |r| {
            id.matches(r) && r.get(&expected.name) == Some(&expected.value)
        });

        let mut parameters = row.columns().to_vec();
        parameters.extend(id.parts().cloned());
        parameters.push(expected_parameter(expected));
        state.record(StatementKind::Update, table, sql, parameters, affected);
        Ok(affected > 0)
    }

    fn delete(&self, table: &str, id: &Identifier) -> Result<usize> {
        self.delete_by_identifier(table, id)
    }

    fn delete_with_version(&self, table: &str, id: &Identifier, expected: &Parameter) -> Result<usize> {
        let sql = self
            .generator
            .delete_with_version(table, &id.column_names(), &expected.name);

        let mut state = self.state.lock()?;
        let affected = self.remove_matching(&mut state, table, |r| {
            id.matches(r) && r.get(&expected.name) == Some(&expected.value)
        })?;

        let mut parameters: Vec<Parameter> = id.parts().cloned().collect();
        parameters.push(expected_parameter(expected));
        state.record(StatementKind::Delete, table, sql, parameters, affected);
        Ok(affected)
    }

    fn delete_by_identifier(&self, table: &str, identifier: &Identifier) -> Result<usize> {
        let sql = self.generator.delete(table, &identifier.column_names());

        let mut state = self.state.lock()?;
        let affected = self.remove_matching(&mut state, table, |r| identifier.matches(r))?;

        state.record(
            StatementKind::Delete,
            table,
            sql,
            identifier.parts().cloned().collect(),
            affected,
        );
        Ok(affected)
    }

    fn delete_all(&self, table: &str) -> Result<usize> {
        let sql = self.generator.delete(table, &[]);

        let mut state = self.state.lock()?;
        let affected = self.remove_matching(&mut state, table, |_| true)?;

        state.record(StatementKind::Delete, table, sql, Vec::new(), affected);
        Ok(affected)
    }

    fn find_by_id(&self, table: &str, id: &Identifier) -> Result<Option<Row>> {
        let sql = self.generator.select_where(table, &id.column_names(), None);

        let mut state = self.state.lock()?;
        let found = state.rows(table).iter().find(|r| id.matches(r)).cloned();

        state.record(
            StatementKind::Select,
            table,
            sql,
            id.parts().cloned().collect(),
            usize::from(found.is_some()),
        );
        Ok(found)
    }

    fn find_all_by_ids(&self, table: &str, ids: &[Identifier]) -> Result<Vec<Row>> {
        let Some(first) = ids.first() else {
            return Ok(Vec::new());
        };
        let sql = self
            .generator
            .select_by_ids(table, &first.column_names(), ids.len());

        let mut state = self.state.lock()?;
        let rows: Vec<Row> = state
            .rows(table)
            .iter()
            .filter(|r| ids.iter().any(|id| id.matches(r)))
            .cloned()
            .collect();

        let parameters = ids
            .iter()
            .enumerate()
            .flat_map(|(i, id)| {
                id.parts()
                    .map(move |p| Parameter::new(format!("{}{}", p.name, i), p.value.clone(), p.sql_type))
                    .collect::<Vec<_>>()
            })
            .collect();
        state.record(StatementKind::Select, table, sql, parameters, rows.len());
        Ok(rows)
    }

    fn find_all(&self, table: &str) -> Result<Vec<Row>> {
        let sql = self.generator.select_all(table);

        let mut state = self.state.lock()?;
        let rows = state.rows(table).to_vec();

        state.record(StatementKind::Select, table, sql, Vec::new(), rows.len());
        Ok(rows)
    }

    fn find_all_by_identifier(
        &self,
        table: &str,
        identifier: &Identifier,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>> {
        let sql = self
            .generator
            .select_where(table, &identifier.column_names(), order_by);

        let mut state = self.state.lock()?;
        let mut rows: Vec<Row> = state
            .rows(table)
            .iter()
            .filter(|r| identifier.matches(r))
            .cloned()
            .collect();
        if let Some(column) = order_by {
            sort_rows(&mut rows, column)?;
        }

        state.record(
            StatementKind::Select,
            table,
            sql,
            identifier.parts().cloned().collect(),
            rows.len(),
        );
        Ok(rows)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let sql = self.generator.count(table);

        let mut state = self.state.lock()?;
        let count = state.rows(table).len();

        state.record(StatementKind::Select, table, sql, Vec::new(), count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk() -> ForeignKey {
        ForeignKey {
            table: "manual".into(),
            column: "lego_set".into(),
            referenced_table: "lego_set".into(),
            referenced_column: "id".into(),
        }
    }

    fn store() -> InMemoryDataAccessStrategy {
        InMemoryDataAccessStrategy::new()
            .with_primary_key("lego_set", &["id"])
            .with_foreign_key(fk())
    }

    fn parent(id: i64) -> Identifier {
        Identifier::of("lego_set", Value::Integer(id), SqlType::Integer)
    }

    #[test]
    fn test_insert_generates_sequential_ids() {
        let store = store();
        let generation = IdGeneration::new("id", SqlType::Integer);
        let row = RowData::new().with("name", Value::from("Star Destroyer"), SqlType::Text);

        let first = store
            .insert("lego_set", &row, &Identifier::empty(), Some(&generation))
            .unwrap();
        let second = store
            .insert("lego_set", &row, &Identifier::empty(), Some(&generation))
            .unwrap();

        assert_eq!(first, Some(Value::Integer(1)));
        assert_eq!(second, Some(Value::Integer(2)));
        assert_eq!(store.count("lego_set").unwrap(), 2);
    }

    #[test]
    fn test_exhausted_id_sequence_is_a_constraint_violation() {
        let store = store();
        let generation = IdGeneration::new("id", SqlType::Integer);
        let last = RowData::new().with("id", Value::Integer(i64::MAX), SqlType::Integer);
        store.insert("lego_set", &last, &Identifier::empty(), None).unwrap();

        let row = RowData::new().with("name", Value::from("Millennium Falcon"), SqlType::Text);
        let result = store.insert("lego_set", &row, &Identifier::empty(), Some(&generation));

        assert!(matches!(result, Err(DbError::ConstraintViolation(_))));
        assert_eq!(store.count("lego_set").unwrap(), 1);
    }

    #[test]
    fn test_explicit_ids_advance_the_counter() {
        let store = store();
        let explicit = RowData::new().with("id", Value::Integer(10), SqlType::Integer);
        store
            .insert("lego_set", &explicit, &Identifier::empty(), None)
            .unwrap();

        let generated = store
            .insert(
                "lego_set",
                &RowData::new(),
                &Identifier::empty(),
                Some(&IdGeneration::new("id", SqlType::Integer)),
            )
            .unwrap();
        assert_eq!(generated, Some(Value::Integer(11)));

        let duplicate = store.insert("lego_set", &explicit, &Identifier::empty(), None);
        assert!(matches!(duplicate, Err(DbError::ConstraintViolation(_))));
    }

    #[test]
    fn test_foreign_key_is_checked_on_insert() {
        let store = store();
        let row = RowData::new().with("content", Value::from("intro"), SqlType::Text);

        let err = store.insert("manual", &row, &parent(99), None).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(msg) if msg.contains("non-existent key")));
        assert!(store.rows("manual").unwrap().is_empty());
    }

    #[test]
    fn test_delete_of_referenced_parent_is_rejected() {
        let store = store();
        let id_row = RowData::new().with("id", Value::Integer(1), SqlType::Integer);
        store.insert("lego_set", &id_row, &Identifier::empty(), None).unwrap();
        store
            .insert("manual", &RowData::new(), &parent(1), None)
            .unwrap();

        let root = Identifier::of("id", Value::Integer(1), SqlType::Integer);
        assert!(matches!(
            store.delete("lego_set", &root),
            Err(DbError::ConstraintViolation(_))
        ));

        assert_eq!(store.delete_by_identifier("manual", &parent(1)).unwrap(), 1);
        assert_eq!(store.delete("lego_set", &root).unwrap(), 1);
    }

    #[test]
    fn test_versioned_update_only_matches_expected_version() {
        let store = InMemoryDataAccessStrategy::new();
        let row = RowData::new()
            .with("id", Value::Integer(1), SqlType::Integer)
            .with("version", Value::Integer(0), SqlType::Integer);
        store.insert("lego_set", &row, &Identifier::empty(), None).unwrap();

        let id = Identifier::of("id", Value::Integer(1), SqlType::Integer);
        let next = RowData::new().with("version", Value::Integer(1), SqlType::Integer);
        let stale = Parameter::new("version", Value::Integer(5), SqlType::Integer);
        let current = Parameter::new("version", Value::Integer(0), SqlType::Integer);

        assert!(!store.update_with_version("lego_set", &id, &next, &stale).unwrap());
        assert!(store.update_with_version("lego_set", &id, &next, &current).unwrap());
        assert_eq!(
            store.find_by_id("lego_set", &id).unwrap().unwrap().get("version"),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn test_find_all_by_identifier_orders_by_qualifier() {
        let store = InMemoryDataAccessStrategy::new();
        for (key, content) in [(1, "second"), (0, "first")] {
            let keys = parent(7).with_part("lego_set_key", Value::Integer(key), SqlType::Integer);
            let row = RowData::new().with("content", Value::from(content), SqlType::Text);
            store.insert("manual", &row, &keys, None).unwrap();
        }

        let rows = store
            .find_all_by_identifier("manual", &parent(7), Some("lego_set_key"))
            .unwrap();
        let contents: Vec<_> = rows.iter().map(|r| r["content"].clone()).collect();
        assert_eq!(contents, vec![Value::from("first"), Value::from("second")]);
    }

    #[test]
    fn test_journal_records_rendered_sql() {
        let store = InMemoryDataAccessStrategy::new();
        let row = RowData::new().with("content", Value::from("intro"), SqlType::Text);
        store.insert("manual", &row, &parent(3), None).unwrap();
        store
            .find_all_by_ids(
                "manual",
                &[parent(3), parent(4)],
            )
            .unwrap();

        let journal = store.journal().unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].kind, StatementKind::Insert);
        assert_eq!(
            journal[0].sql,
            "INSERT INTO manual (lego_set, content) VALUES (:lego_set, :content)"
        );
        assert_eq!(
            journal[1].sql,
            "SELECT * FROM manual WHERE lego_set IN (:lego_set0, :lego_set1)"
        );
        assert_eq!(journal[1].affected, 1);

        store.clear_journal().unwrap();
        assert!(store.journal().unwrap().is_empty());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let store = InMemoryDataAccessStrategy::new();
        let row = RowData::new().with("id", Value::from("one"), SqlType::Integer);
        assert!(matches!(
            store.insert("lego_set", &row, &Identifier::empty(), None),
            Err(DbError::TypeMismatch(_))
        ));
    }
}
