use super::condition::Condition;
use super::expression::{BindMarker, Column, Expression, Table};
use super::tuple::TupleExpression;

/// Renders the statements the aggregate engine issues against one table.
///
/// Every value is bound by name: column `c` binds as `:c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGenerator;

impl SqlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Bind name of the expected version in a version-checked statement.
    pub fn expected_version_marker(version_column: &str) -> String {
        format!("expected_{}", version_column)
    }

    /// `a = :a AND b = :b`, or `None` without columns.
    pub fn equals_all(&self, columns: &[&str]) -> Option<Condition> {
        columns
            .iter()
            .map(|c| Condition::is_equal(Column::new(*c), BindMarker::new(*c)))
            .reduce(Condition::and)
    }

    /// Lookup of several rows by id: `id IN (:id0, :id1)` for a single id
    /// column, `(a, b) IN ((:a0, :b0), (:a1, :b1))` for composite ids.
    pub fn in_ids(&self, id_columns: &[&str], count: usize) -> Condition {
        match id_columns {
            [single] => Condition::is_in(
                Column::new(*single),
                (0..count).map(|i| Expression::bind(format!("{}{}", single, i))),
            ),
            columns => Condition::is_in(
                columns
                    .iter()
                    .map(|c| Expression::column(*c))
                    .collect::<TupleExpression>(),
                (0..count).map(|i| {
                    Expression::Tuple(
                        columns
                            .iter()
                            .map(|c| Expression::bind(format!("{}{}", c, i)))
                            .collect(),
                    )
                }),
            ),
        }
    }

    pub fn insert(&self, table: &str, columns: &[&str]) -> String {
        let table = Table::new(table);
        if columns.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", table);
        }
        let names = TupleExpression::create(columns.iter().map(|c| Expression::column(*c)));
        let values = TupleExpression::create(columns.iter().map(|c| Expression::bind(*c)));
        format!("INSERT INTO {} {} VALUES {}", table, names, values)
    }

    pub fn update(&self, table: &str, columns: &[&str], id_columns: &[&str]) -> String {
        let mut sql = format!("UPDATE {} SET {}", Table::new(table), self.assignments(columns));
        if let Some(condition) = self.equals_all(id_columns) {
            sql.push_str(&format!(" WHERE {}", condition));
        }
        sql
    }

    pub fn update_with_version(
        &self,
        table: &str,
        columns: &[&str],
        id_columns: &[&str],
        version_column: &str,
    ) -> String {
        let version = self.version_condition(version_column);
        let condition = match self.equals_all(id_columns) {
            Some(ids) => ids.and(version),
            None => version,
        };
        format!(
            "UPDATE {} SET {} WHERE {}",
            Table::new(table),
            self.assignments(columns),
            condition
        )
    }

    pub fn delete(&self, table: &str, columns: &[&str]) -> String {
        match self.equals_all(columns) {
            Some(condition) => format!("DELETE FROM {} WHERE {}", Table::new(table), condition),
            None => format!("DELETE FROM {}", Table::new(table)),
        }
    }

    pub fn delete_with_version(&self, table: &str, id_columns: &[&str], version_column: &str) -> String {
        let version = self.version_condition(version_column);
        let condition = match self.equals_all(id_columns) {
            Some(ids) => ids.and(version),
            None => version,
        };
        format!("DELETE FROM {} WHERE {}", Table::new(table), condition)
    }

    pub fn select_all(&self, table: &str) -> String {
        format!("SELECT * FROM {}", Table::new(table))
    }

    pub fn select_where(&self, table: &str, columns: &[&str], order_by: Option<&str>) -> String {
        let mut sql = self.select_all(table);
        if let Some(condition) = self.equals_all(columns) {
            sql.push_str(&format!(" WHERE {}", condition));
        }
        if let Some(column) = order_by {
            sql.push_str(&format!(" ORDER BY {}", Column::new(column)));
        }
        sql
    }

    pub fn select_by_ids(&self, table: &str, id_columns: &[&str], count: usize) -> String {
        format!(
            "SELECT * FROM {} WHERE {}",
            Table::new(table),
            self.in_ids(id_columns, count)
        )
    }

    pub fn count(&self, table: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", Table::new(table))
    }

    fn assignments(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| Condition::is_equal(Column::new(*c), BindMarker::new(*c)).to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn version_condition(&self, version_column: &str) -> Condition {
        Condition::is_equal(
            Column::new(version_column),
            BindMarker::new(Self::expected_version_marker(version_column)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{BindMarkerCollector, walk};

    #[test]
    fn test_insert() {
        let generator = SqlGenerator::new();
        assert_eq!(
            generator.insert("manual", &["lego_set", "lego_set_key", "content"]),
            "INSERT INTO manual (lego_set, lego_set_key, content) VALUES (:lego_set, :lego_set_key, :content)"
        );
        assert_eq!(
            generator.insert("lego_set", &[]),
            "INSERT INTO lego_set DEFAULT VALUES"
        );
    }

    #[test]
    fn test_update_and_versioned_update() {
        let generator = SqlGenerator::new();
        assert_eq!(
            generator.update("lego_set", &["name"], &["id"]),
            "UPDATE lego_set SET name = :name WHERE id = :id"
        );
        assert_eq!(
            generator.update_with_version("lego_set", &["name", "version"], &["id"], "version"),
            "UPDATE lego_set SET name = :name, version = :version WHERE id = :id AND version = :expected_version"
        );
    }

    #[test]
    fn test_delete() {
        let generator = SqlGenerator::new();
        assert_eq!(
            generator.delete("page", &["lego_set"]),
            "DELETE FROM page WHERE lego_set = :lego_set"
        );
        assert_eq!(generator.delete("page", &[]), "DELETE FROM page");
        assert_eq!(
            generator.delete_with_version("lego_set", &["id"], "version"),
            "DELETE FROM lego_set WHERE id = :id AND version = :expected_version"
        );
    }

    #[test]
    fn test_select() {
        let generator = SqlGenerator::new();
        assert_eq!(
            generator.select_where("manual", &["lego_set"], Some("lego_set_key")),
            "SELECT * FROM manual WHERE lego_set = :lego_set ORDER BY lego_set_key"
        );
        assert_eq!(generator.count("app.simple"), "SELECT COUNT(*) FROM app.simple");
    }

    #[test]
    fn test_select_by_ids() {
        let generator = SqlGenerator::new();
        assert_eq!(
            generator.select_by_ids("lego_set", &["id"], 2),
            "SELECT * FROM lego_set WHERE id IN (:id0, :id1)"
        );
        assert_eq!(
            generator.select_by_ids("plant", &["region", "number"], 2),
            "SELECT * FROM plant WHERE (region, number) IN ((:region0, :number0), (:region1, :number1))"
        );

        let mut collector = BindMarkerCollector::default();
        walk(&generator.in_ids(&["region", "number"], 1), &mut collector);
        assert_eq!(collector.names(), ["region0", "number0"]);
    }
}
