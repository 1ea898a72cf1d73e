use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{DbError, ForeignKey, Result, SqlType};

use super::descriptor::{EntityDescriptor, PropertyKind};
use super::naming::{MappingConfig, NamingStrategy};
use super::path::{AggregatePath, PathTree};

/// Schema file layout: optional config plus the entity list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub config: MappingConfig,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
}

/// Registry of entity descriptors and their precomputed aggregate paths.
///
/// Built once, read-only afterwards; share it behind an `Arc`.
#[derive(Debug)]
pub struct MappingContext {
    naming: NamingStrategy,
    entities: HashMap<String, Arc<EntityDescriptor>>,
    declaration_order: Vec<String>,
    trees: HashMap<String, PathTree>,
}

#[derive(Debug, Default)]
pub struct MappingContextBuilder {
    config: MappingConfig,
    entities: Vec<EntityDescriptor>,
}

impl MappingContextBuilder {
    pub fn config(mut self, config: MappingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn register_all(mut self, entities: impl IntoIterator<Item = EntityDescriptor>) -> Self {
        self.entities.extend(entities);
        self
    }

    pub fn build(self) -> Result<MappingContext> {
        let naming = NamingStrategy::new(self.config);
        let mut entities = HashMap::with_capacity(self.entities.len());
        let mut declaration_order = Vec::with_capacity(self.entities.len());

        for entity in self.entities {
            validate_entity(&entity)?;
            let name = entity.name.clone();
            if entities.insert(name.clone(), Arc::new(entity)).is_some() {
                return Err(DbError::MappingError(format!(
                    "Entity '{}' registered twice",
                    name
                )));
            }
            declaration_order.push(name);
        }

        let mut trees = HashMap::with_capacity(entities.len());
        for name in &declaration_order {
            let root = entities[name].clone();
            trees.insert(name.clone(), PathTree::build(root, &entities, &naming)?);
        }

        Ok(MappingContext {
            naming,
            entities,
            declaration_order,
            trees,
        })
    }
}

fn validate_entity(entity: &EntityDescriptor) -> Result<()> {
    let mut seen = HashSet::new();
    for property in &entity.properties {
        if !seen.insert(property.name.as_str()) {
            return Err(DbError::MappingError(format!(
                "Property '{}' declared twice on '{}'",
                property.name, entity.name
            )));
        }
        if property.id && !matches!(property.kind, PropertyKind::Simple { .. } | PropertyKind::Embedded { .. }) {
            return Err(DbError::MappingError(format!(
                "Id property '{}' of '{}' must be simple or embedded",
                property.name, entity.name
            )));
        }
        if property.version && property.sql_type() != Some(SqlType::Integer) {
            return Err(DbError::MappingError(format!(
                "Version property '{}' of '{}' must be a simple INTEGER",
                property.name, entity.name
            )));
        }
        if property.id && property.version {
            return Err(DbError::MappingError(format!(
                "Property '{}' of '{}' cannot be both id and version",
                property.name, entity.name
            )));
        }
    }

    if entity.properties.iter().filter(|p| p.id).count() > 1 {
        return Err(DbError::MappingError(format!(
            "Entity '{}' declares more than one id property; use an embedded id instead",
            entity.name
        )));
    }
    if entity.properties.iter().filter(|p| p.version).count() > 1 {
        return Err(DbError::MappingError(format!(
            "Entity '{}' declares more than one version property",
            entity.name
        )));
    }
    Ok(())
}

impl MappingContext {
    pub fn builder() -> MappingContextBuilder {
        MappingContextBuilder::default()
    }

    /// Builds a context from a JSON schema document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(json)
            .map_err(|e| DbError::MappingError(format!("Invalid schema document: {}", e)))?;
        Self::from_document(document)
    }

    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        Self::builder()
            .config(document.config)
            .register_all(document.entities)
            .build()
    }

    pub fn config(&self) -> &MappingConfig {
        self.naming.config()
    }

    pub fn naming(&self) -> &NamingStrategy {
        &self.naming
    }

    pub fn entity(&self, name: &str) -> Result<&Arc<EntityDescriptor>> {
        self.entities
            .get(name)
            .ok_or_else(|| DbError::MappingError(format!("Unknown entity '{}'", name)))
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.declaration_order.iter().map(|name| &self.entities[name])
    }

    fn tree(&self, root: &str) -> Result<&PathTree> {
        self.trees
            .get(root)
            .ok_or_else(|| DbError::MappingError(format!("Unknown entity '{}'", root)))
    }

    pub fn root_path(&self, root: &str) -> Result<AggregatePath> {
        Ok(self.tree(root)?.root().clone())
    }

    /// Looks up a path by its dotted property names, e.g. `"manuals.pages"`.
    pub fn path(&self, root: &str, dotted: &str) -> Result<AggregatePath> {
        self.tree(root)?.get(dotted).cloned().ok_or_else(|| {
            DbError::MappingError(format!("No property path '{}' on '{}'", dotted, root))
        })
    }

    /// Direct child paths, one per declared property, in declaration order.
    pub fn child_paths(&self, path: &AggregatePath) -> &[AggregatePath] {
        self.trees
            .get(&path.root_entity().name)
            .map(|tree| tree.children(path))
            .unwrap_or(&[])
    }

    /// Every non-root path of an aggregate, depth first.
    pub fn paths(&self, root: &str) -> Result<&[AggregatePath]> {
        Ok(self.tree(root)?.paths())
    }

    /// The root path followed by every path that owns a table, depth first.
    pub fn table_paths(&self, root: &str) -> Result<Vec<AggregatePath>> {
        let tree = self.tree(root)?;
        let mut out = vec![tree.root().clone()];
        out.extend(tree.paths().iter().filter(|p| p.owns_table()).cloned());
        Ok(out)
    }

    /// Tables owned directly by `path`'s entity, looking through embedded properties.
    pub fn table_children(&self, path: &AggregatePath) -> Vec<AggregatePath> {
        let mut out = Vec::new();
        self.collect_table_children(path, &mut out);
        out
    }

    fn collect_table_children(&self, path: &AggregatePath, out: &mut Vec<AggregatePath>) {
        for child in self.child_paths(path) {
            if child.owns_table() {
                out.push(child.clone());
            } else if child.is_embedded() {
                self.collect_table_children(child, out);
            }
        }
    }

    /// Simple-property paths stored in the table owned by `path`, embedded ones included.
    pub fn scalar_columns(&self, path: &AggregatePath) -> Vec<AggregatePath> {
        let mut out = Vec::new();
        self.collect_scalar_columns(path, &mut out);
        out
    }

    fn collect_scalar_columns(&self, path: &AggregatePath, out: &mut Vec<AggregatePath>) {
        for child in self.child_paths(path) {
            if child.leaf_property().is_some_and(|p| p.is_simple()) {
                out.push(child.clone());
            } else if child.is_embedded() {
                self.collect_scalar_columns(child, out);
            }
        }
    }

    /// Back-references of every child table whose referenced id maps to one column.
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let mut keys = Vec::new();
        for name in &self.declaration_order {
            let tree = &self.trees[name];
            for path in tree.paths().iter().filter(|p| p.owns_table()) {
                let Ok(id_parent) = path.id_defining_parent_path() else {
                    continue;
                };
                let Ok(reverse) = path.table_info().reverse_column_info() else {
                    continue;
                };
                let Some(referenced) = id_parent.table_info().single_id_column() else {
                    continue;
                };
                let key = ForeignKey {
                    table: path.table_info().qualified_table_name().to_string(),
                    column: reverse.name().to_string(),
                    referenced_table: id_parent.table_info().qualified_table_name().to_string(),
                    referenced_column: referenced.name().to_string(),
                };
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Id columns per table for every entity that declares an id.
    pub fn primary_keys(&self) -> Vec<(String, Vec<String>)> {
        let mut keys: Vec<(String, Vec<String>)> = Vec::new();
        for name in &self.declaration_order {
            let info = self.trees[name].root().table_info();
            if info.id_column_infos().is_empty()
                || keys.iter().any(|(t, _)| t == info.qualified_table_name())
            {
                continue;
            }
            keys.push((
                info.qualified_table_name().to_string(),
                info.id_column_infos()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            ));
        }
        keys
    }
}
