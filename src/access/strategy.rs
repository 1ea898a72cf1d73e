use crate::convert::Identifier;
use crate::core::{Parameter, Result, Row, RowData, SqlType, Value};

/// Id column the store fills in on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGeneration {
    pub column: String,
    pub sql_type: SqlType,
}

impl IdGeneration {
    pub fn new(column: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            column: column.into(),
            sql_type,
        }
    }
}

/// Table-level statements the aggregate engine is built on.
///
/// Implementations execute one statement per call and report failures as
/// [`DbError`](crate::core::DbError)s; the engine never retries.
pub trait DataAccessStrategy {
    /// Inserts `row` plus the back-reference and qualifier columns in
    /// `parent_keys`. With `id_generation`, the store assigns the id and
    /// returns it.
    fn insert(
        &self,
        table: &str,
        row: &RowData,
        parent_keys: &Identifier,
        id_generation: Option<&IdGeneration>,
    ) -> Result<Option<Value>>;

    /// Returns `false` when no row matched `id`.
    fn update(&self, table: &str, id: &Identifier, row: &RowData) -> Result<bool>;

    /// Like [`update`](Self::update), but only matches while the stored
    /// version equals `expected`.
    fn update_with_version(
        &self,
        table: &str,
        id: &Identifier,
        row: &RowData,
        expected: &Parameter,
    ) -> Result<bool>;

    fn delete(&self, table: &str, id: &Identifier) -> Result<usize>;

    fn delete_with_version(&self, table: &str, id: &Identifier, expected: &Parameter) -> Result<usize>;

    /// Deletes every row whose columns match all parts of `identifier`.
    fn delete_by_identifier(&self, table: &str, identifier: &Identifier) -> Result<usize>;

    fn delete_all(&self, table: &str) -> Result<usize>;

    fn find_by_id(&self, table: &str, id: &Identifier) -> Result<Option<Row>>;

    fn find_all_by_ids(&self, table: &str, ids: &[Identifier]) -> Result<Vec<Row>>;

    fn find_all(&self, table: &str) -> Result<Vec<Row>>;

    /// Rows matching `identifier`, sorted by `order_by` when given.
    fn find_all_by_identifier(
        &self,
        table: &str,
        identifier: &Identifier,
        order_by: Option<&str>,
    ) -> Result<Vec<Row>>;

    fn count(&self, table: &str) -> Result<usize>;

    fn exists_by_id(&self, table: &str, id: &Identifier) -> Result<bool> {
        Ok(self.find_by_id(table, id)?.is_some())
    }
}
