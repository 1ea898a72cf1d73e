use std::sync::Arc;

use log::warn;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{Level, event, info_span};

use crate::access::DataAccessStrategy;
use crate::convert::{IdentifierBuilder, MappingRelationalConverter, RelationalConverter};
use crate::core::{DbError, Parameter, Result, Row, SqlType};
use crate::mapping::{AggregatePath, MappingContext};

use super::aggregate::{Aggregate, AggregateOperations};
use super::deleter::AggregateDeleter;
use super::document::{id_document, property};
use super::events::{AggregateEvent, AggregateEventKind, AggregateEventListener};
use super::reader::AggregateReader;
use super::writer::AggregateWriter;

/// Entry point for persisting aggregates through a [`DataAccessStrategy`].
///
/// Typed access goes through [`AggregateOperations`]; the `*_document`
/// methods take the entity name and work on `serde_json` documents directly.
pub struct AggregateTemplate<S: DataAccessStrategy> {
    converter: MappingRelationalConverter,
    strategy: S,
    listeners: Vec<Arc<dyn AggregateEventListener>>,
}

impl<S: DataAccessStrategy> AggregateTemplate<S> {
    pub fn new(context: Arc<MappingContext>, strategy: S) -> Self {
        Self {
            converter: MappingRelationalConverter::new(context),
            strategy,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn AggregateEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn context(&self) -> &Arc<MappingContext> {
        self.converter.context()
    }

    pub fn converter(&self) -> &MappingRelationalConverter {
        &self.converter
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    fn publish(&self, event: AggregateEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    /// Root path of `entity`, rejected up front when an entity that owns
    /// child tables has an id the children cannot reference.
    fn root(&self, entity: &str) -> Result<AggregatePath> {
        let context = self.context();
        for path in context.table_paths(entity)? {
            if !(path.is_root() || path.has_id_property()) || context.table_children(&path).is_empty() {
                continue;
            }
            let id_property = path.required_id_property()?;
            self.converter.column_type(id_property).map_err(|e| {
                DbError::MappingError(format!("Cannot persist children of '{}': {}", path, e))
            })?;
        }
        context.root_path(entity)
    }

    fn writer(&self) -> AggregateWriter<'_, S> {
        AggregateWriter::new(&self.converter, &self.strategy)
    }

    fn reader(&self) -> AggregateReader<'_, S> {
        AggregateReader::new(&self.converter, &self.strategy)
    }

    fn deleter(&self) -> AggregateDeleter<'_, S> {
        AggregateDeleter::new(&self.converter, &self.strategy)
    }

    fn id_of(&self, root: &AggregatePath, document: &JsonValue) -> Result<JsonValue> {
        Ok(property(document, &root.required_id_property()?.name).clone())
    }

    /// Whether `save` should insert: the version is null for versioned
    /// entities, otherwise the id is.
    fn is_new(&self, root: &AggregatePath, document: &JsonValue) -> Result<bool> {
        let entity = root.required_leaf_entity()?;
        Ok(match entity.version_property() {
            Some(version) => property(document, &version.name).is_null(),
            None => self.id_of(root, document)?.is_null(),
        })
    }

    pub fn insert_document(&self, entity: &str, mut document: JsonValue) -> Result<JsonValue> {
        let span = info_span!("aggregate.insert", entity = %entity);
        let _enter = span.enter();

        let root = self.root(entity)?;
        let id = self.id_of(&root, &document)?;
        self.publish(
            AggregateEvent::new(AggregateEventKind::BeforeSave, entity)
                .with_id(&id)
                .with_document(&document),
        );

        if let Err(err) = self.writer().insert_root(&root, &mut document) {
            event!(Level::ERROR, error = %err, "aggregate insert failed");
            return Err(err);
        }

        let id = self.id_of(&root, &document)?;
        event!(Level::DEBUG, id = %id, "aggregate inserted");
        self.publish(
            AggregateEvent::new(AggregateEventKind::AfterSave, entity)
                .with_id(&id)
                .with_document(&document),
        );
        Ok(document)
    }

    pub fn update_document(&self, entity: &str, mut document: JsonValue) -> Result<JsonValue> {
        let span = info_span!("aggregate.update", entity = %entity);
        let _enter = span.enter();

        let root = self.root(entity)?;
        let id = self.id_of(&root, &document)?;
        self.publish(
            AggregateEvent::new(AggregateEventKind::BeforeSave, entity)
                .with_id(&id)
                .with_document(&document),
        );

        if let Err(err) = self.writer().update_root(&root, &mut document) {
            event!(Level::ERROR, error = %err, "aggregate update failed");
            return Err(err);
        }

        event!(Level::DEBUG, id = %id, "aggregate updated");
        self.publish(
            AggregateEvent::new(AggregateEventKind::AfterSave, entity)
                .with_id(&id)
                .with_document(&document),
        );
        Ok(document)
    }

    pub fn save_document(&self, entity: &str, document: JsonValue) -> Result<JsonValue> {
        let root = self.root(entity)?;
        if self.is_new(&root, &document)? {
            self.insert_document(entity, document)
        } else {
            self.update_document(entity, document)
        }
    }

    pub fn find_document_by_id(&self, entity: &str, id: &JsonValue) -> Result<Option<JsonValue>> {
        let span = info_span!("aggregate.find_by_id", entity = %entity);
        let _enter = span.enter();

        let root = self.root(entity)?;
        let identifier = IdentifierBuilder::for_id(&self.converter, &root, id)?.build();
        let Some(row) = self
            .strategy
            .find_by_id(root.table_info().qualified_table_name(), &identifier)?
        else {
            return Ok(None);
        };

        let document = self.reader().read(&root, &row)?;
        self.publish(
            AggregateEvent::new(AggregateEventKind::AfterLoad, entity)
                .with_id(id)
                .with_document(&document),
        );
        Ok(Some(document))
    }

    pub fn find_all_documents_by_id(&self, entity: &str, ids: &[JsonValue]) -> Result<Vec<JsonValue>> {
        let span = info_span!("aggregate.find_all_by_id", entity = %entity, count = ids.len());
        let _enter = span.enter();

        let root = self.root(entity)?;
        let identifiers = ids
            .iter()
            .map(|id| Ok(IdentifierBuilder::for_id(&self.converter, &root, id)?.build()))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .strategy
            .find_all_by_ids(root.table_info().qualified_table_name(), &identifiers)?;
        self.load_rows(&root, entity, rows)
    }

    pub fn find_all_documents(&self, entity: &str) -> Result<Vec<JsonValue>> {
        let span = info_span!("aggregate.find_all", entity = %entity);
        let _enter = span.enter();

        let root = self.root(entity)?;
        let rows = self.strategy.find_all(root.table_info().qualified_table_name())?;
        self.load_rows(&root, entity, rows)
    }

    fn load_rows(
        &self,
        root: &AggregatePath,
        entity: &str,
        rows: Vec<Row>,
    ) -> Result<Vec<JsonValue>> {
        let reader = self.reader();
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let document = reader.read(root, &row)?;
            self.publish(
                AggregateEvent::new(AggregateEventKind::AfterLoad, entity)
                    .with_id(&id_document(&self.converter, root, &row)?)
                    .with_document(&document),
            );
            documents.push(document);
        }
        event!(Level::DEBUG, loaded = documents.len(), "aggregates loaded");
        Ok(documents)
    }

    pub fn exists_document_by_id(&self, entity: &str, id: &JsonValue) -> Result<bool> {
        let root = self.root(entity)?;
        let identifier = IdentifierBuilder::for_id(&self.converter, &root, id)?.build();
        self.strategy
            .exists_by_id(root.table_info().qualified_table_name(), &identifier)
    }

    pub fn count_documents(&self, entity: &str) -> Result<usize> {
        let root = self.root(entity)?;
        self.strategy.count(root.table_info().qualified_table_name())
    }

    /// Deletes an aggregate given as a document; versioned aggregates are
    /// only deleted at the version the document carries.
    pub fn delete_document(&self, entity: &str, document: &JsonValue) -> Result<()> {
        let root = self.root(entity)?;
        let id = self.id_of(&root, document)?;
        if id.is_null() {
            return Err(DbError::InvalidArgument(format!(
                "Cannot delete '{}' without an id",
                entity
            )));
        }

        let expected = match root.required_leaf_entity()?.version_property() {
            Some(version) => {
                let value = property(document, &version.name);
                if value.is_null() {
                    None
                } else {
                    let column = self
                        .context()
                        .path(entity, &version.name)?
                        .column_info()?
                        .name()
                        .to_string();
                    let value = self.converter.read_value(value, SqlType::Integer)?;
                    Some(Parameter::new(column, value, SqlType::Integer))
                }
            }
            None => None,
        };

        self.delete_with(&root, entity, &id, Some(document), expected.as_ref())
    }

    pub fn delete_document_by_id(&self, entity: &str, id: &JsonValue) -> Result<()> {
        let root = self.root(entity)?;
        self.delete_with(&root, entity, id, None, None)
    }

    fn delete_with(
        &self,
        root: &AggregatePath,
        entity: &str,
        id: &JsonValue,
        document: Option<&JsonValue>,
        expected_version: Option<&Parameter>,
    ) -> Result<()> {
        let span = info_span!("aggregate.delete", entity = %entity, id = %id);
        let _enter = span.enter();

        let mut before = AggregateEvent::new(AggregateEventKind::BeforeDelete, entity).with_id(id);
        if let Some(document) = document {
            before = before.with_document(document);
        }
        self.publish(before.clone());

        let deleted = match self.deleter().delete_root(root, id, expected_version) {
            Ok(deleted) => deleted,
            Err(err) => {
                event!(Level::ERROR, error = %err, "aggregate delete failed");
                return Err(err);
            }
        };
        if deleted == 0 {
            warn!("Delete of '{}' with id {} matched no rows", entity, id);
        }

        event!(Level::DEBUG, rows = deleted, "aggregate deleted");
        self.publish(AggregateEvent {
            kind: AggregateEventKind::AfterDelete,
            ..before
        });
        Ok(())
    }

    pub fn delete_all_documents(&self, entity: &str) -> Result<()> {
        let span = info_span!("aggregate.delete_all", entity = %entity);
        let _enter = span.enter();

        let root = self.root(entity)?;
        let table = root.table_info().qualified_table_name();
        if self.context().table_children(&root).is_empty() {
            let deleted = self.strategy.delete_all(table)?;
            event!(Level::DEBUG, rows = deleted, "aggregates deleted");
            return Ok(());
        }

        for row in self.strategy.find_all(table)? {
            let id = id_document(&self.converter, &root, &row)?;
            self.delete_with(&root, entity, &id, None, None)?;
        }
        Ok(())
    }
}

fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<JsonValue> {
    Ok(serde_json::to_value(value)?)
}

fn from_document<T: Aggregate>(document: JsonValue) -> Result<T> {
    Ok(serde_json::from_value(document)?)
}

impl<S: DataAccessStrategy> AggregateOperations for AggregateTemplate<S> {
    fn insert<T: Aggregate>(&self, aggregate: T) -> Result<T> {
        from_document(self.insert_document(T::ENTITY, to_document(&aggregate)?)?)
    }

    fn update<T: Aggregate>(&self, aggregate: T) -> Result<T> {
        from_document(self.update_document(T::ENTITY, to_document(&aggregate)?)?)
    }

    fn save<T: Aggregate>(&self, aggregate: T) -> Result<T> {
        from_document(self.save_document(T::ENTITY, to_document(&aggregate)?)?)
    }

    fn find_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<Option<T>> {
        self.find_document_by_id(T::ENTITY, &to_document(id)?)?
            .map(from_document)
            .transpose()
    }

    fn find_all_by_id<T: Aggregate>(&self, ids: &[impl Serialize]) -> Result<Vec<T>> {
        let ids = ids.iter().map(to_document).collect::<Result<Vec<_>>>()?;
        self.find_all_documents_by_id(T::ENTITY, &ids)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    fn find_all<T: Aggregate>(&self) -> Result<Vec<T>> {
        self.find_all_documents(T::ENTITY)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    fn exists_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<bool> {
        self.exists_document_by_id(T::ENTITY, &to_document(id)?)
    }

    fn count<T: Aggregate>(&self) -> Result<usize> {
        self.count_documents(T::ENTITY)
    }

    fn delete<T: Aggregate>(&self, aggregate: &T) -> Result<()> {
        self.delete_document(T::ENTITY, &to_document(aggregate)?)
    }

    fn delete_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<()> {
        self.delete_document_by_id(T::ENTITY, &to_document(id)?)
    }

    fn delete_all<T: Aggregate>(&self) -> Result<()> {
        self.delete_all_documents(T::ENTITY)
    }
}
