use serde_json::Value as JsonValue;

use crate::access::DataAccessStrategy;
use crate::convert::{Identifier, IdentifierBuilder, MappingRelationalConverter};
use crate::core::{DbError, Parameter, Result};
use crate::mapping::{AggregatePath, MappingContext};

use super::document::id_document;

#[derive(Debug)]
pub(crate) struct DeleteAction {
    depth: usize,
    table: String,
    identifier: Identifier,
}

/// Removes an aggregate's rows, deepest tables first.
///
/// All statements are planned before the first DELETE runs, so mapping errors
/// leave the store untouched.
pub(crate) struct AggregateDeleter<'a, S: DataAccessStrategy + ?Sized> {
    converter: &'a MappingRelationalConverter,
    strategy: &'a S,
}

impl<'a, S: DataAccessStrategy + ?Sized> AggregateDeleter<'a, S> {
    pub(crate) fn new(converter: &'a MappingRelationalConverter, strategy: &'a S) -> Self {
        Self { converter, strategy }
    }

    fn context(&self) -> &'a MappingContext {
        self.converter.context()
    }

    /// Deletes the root row and everything it owns.
    ///
    /// With `expected_version`, the stored version is checked before any row
    /// is removed and a mismatch fails with [`DbError::OptimisticLockingFailure`].
    pub(crate) fn delete_root(
        &self,
        root: &AggregatePath,
        id: &JsonValue,
        expected_version: Option<&Parameter>,
    ) -> Result<usize> {
        let identifier = IdentifierBuilder::for_id(self.converter, root, id)?.build();
        let actions = self.plan(root, id)?;
        let table = root.table_info().qualified_table_name();

        if let Some(expected) = expected_version {
            let current = self.strategy.find_by_id(table, &identifier)?;
            if current.as_ref().and_then(|row| row.get(&expected.name)) != Some(&expected.value) {
                return Err(DbError::OptimisticLockingFailure(format!(
                    "Aggregate '{}' with id {} is not at version {}",
                    root, identifier, expected.value
                )));
            }
        }

        let mut deleted = self.execute(&actions)?;
        match expected_version {
            Some(expected) => {
                let affected = self.strategy.delete_with_version(table, &identifier, expected)?;
                if affected == 0 {
                    return Err(DbError::OptimisticLockingFailure(format!(
                        "Aggregate '{}' with id {} is not at version {}",
                        root, identifier, expected.value
                    )));
                }
                deleted += affected;
            }
            None => deleted += self.strategy.delete(table, &identifier)?,
        }
        Ok(deleted)
    }

    /// Every child-table delete below the entity at `path` whose id is `id`,
    /// deepest first. Only reads are issued while planning.
    pub(crate) fn plan(&self, path: &AggregatePath, id: &JsonValue) -> Result<Vec<DeleteAction>> {
        let mut actions = Vec::new();
        self.collect(path, id, &mut actions)?;
        actions.sort_by(|a, b| b.depth.cmp(&a.depth));
        Ok(actions)
    }

    pub(crate) fn execute(&self, actions: &[DeleteAction]) -> Result<usize> {
        let mut deleted = 0;
        for action in actions {
            deleted += self
                .strategy
                .delete_by_identifier(&action.table, &action.identifier)?;
        }
        Ok(deleted)
    }

    /// Child tables below an entity with id `base`. Rows of id-less children
    /// are found through the same back-reference; children with ids of their
    /// own are loaded so their descendants can be addressed.
    fn collect(&self, path: &AggregatePath, base: &JsonValue, actions: &mut Vec<DeleteAction>) -> Result<()> {
        for child in self.context().table_children(path) {
            let identifier = IdentifierBuilder::for_back_references(self.converter, &child, base)?.build();
            let table = child.table_info().qualified_table_name().to_string();

            if !self.context().table_children(&child).is_empty() {
                if child.has_id_property() {
                    for row in self.strategy.find_all_by_identifier(&table, &identifier, None)? {
                        let child_id = id_document(self.converter, &child, &row)?;
                        self.collect(&child, &child_id, actions)?;
                    }
                } else {
                    self.collect(&child, base, actions)?;
                }
            }

            actions.push(DeleteAction {
                depth: child.length(),
                table,
                identifier,
            });
        }
        Ok(())
    }
}
