//! Static navigation of an aggregate's property graph.
//!
//! An [`AggregatePath`] names one route from an aggregate root through nested
//! properties. Paths are built once per root when the
//! [`MappingContext`](super::MappingContext) is built; every derived name
//! (owning table, back-reference column, qualifier column, id columns) is
//! computed at that point and never changes afterwards.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::{DbError, Result, SqlType};

use super::descriptor::{EntityDescriptor, PropertyDescriptor, PropertyKind};
use super::naming::NamingStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnInfo {
    name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Naming facts about the table a path is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    qualified_table_name: String,
    table_name: String,
    reverse_column_info: Option<ColumnInfo>,
    qualifier_column_info: Option<ColumnInfo>,
    qualifier_column_type: Option<SqlType>,
    id_column_infos: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn qualified_table_name(&self) -> &str {
        &self.qualified_table_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column holding the id of the parent row. Root tables have none.
    pub fn reverse_column_info(&self) -> Result<&ColumnInfo> {
        self.reverse_column_info.as_ref().ok_or_else(|| {
            DbError::MappingError(format!(
                "Table '{}' belongs to an aggregate root and has no back-reference column",
                self.qualified_table_name
            ))
        })
    }

    /// Map key or list index column; present only for list and map paths.
    pub fn qualifier_column_info(&self) -> Option<&ColumnInfo> {
        self.qualifier_column_info.as_ref()
    }

    pub fn qualifier_column_type(&self) -> Option<SqlType> {
        self.qualifier_column_type
    }

    /// Id columns of the entity stored in this table; empty when it declares no id.
    pub fn id_column_infos(&self) -> &[ColumnInfo] {
        &self.id_column_infos
    }

    /// The id column when the id maps to exactly one column.
    pub fn single_id_column(&self) -> Option<&ColumnInfo> {
        match self.id_column_infos.as_slice() {
            [single] => Some(single),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct PathData {
    root: Arc<EntityDescriptor>,
    parent: Option<AggregatePath>,
    property: Option<PropertyDescriptor>,
    leaf_entity: Option<Arc<EntityDescriptor>>,
    id_defining_parent: Option<AggregatePath>,
    dotted: String,
    length: usize,
    table_info: Arc<TableInfo>,
    column_info: Option<ColumnInfo>,
    column_prefix: String,
}

/// One property route from an aggregate root. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AggregatePath {
    data: Arc<PathData>,
}

impl AggregatePath {
    pub fn is_root(&self) -> bool {
        self.data.parent.is_none()
    }

    pub fn root_entity(&self) -> &Arc<EntityDescriptor> {
        &self.data.root
    }

    pub fn parent_path(&self) -> Option<&AggregatePath> {
        self.data.parent.as_ref()
    }

    /// Number of property steps from the root; the root itself has length 0.
    pub fn length(&self) -> usize {
        self.data.length
    }

    /// Property names joined with dots; empty for the root.
    pub fn dotted_path(&self) -> &str {
        &self.data.dotted
    }

    pub fn leaf_property(&self) -> Option<&PropertyDescriptor> {
        self.data.property.as_ref()
    }

    pub fn required_leaf_property(&self) -> Result<&PropertyDescriptor> {
        self.leaf_property().ok_or_else(|| {
            DbError::MappingError(format!("Root path '{}' has no leaf property", self))
        })
    }

    /// Entity reached by this path: the root entity, or the target of an
    /// embedded/entity/list/map property.
    pub fn leaf_entity(&self) -> Option<&Arc<EntityDescriptor>> {
        self.data.leaf_entity.as_ref()
    }

    pub fn required_leaf_entity(&self) -> Result<&Arc<EntityDescriptor>> {
        self.leaf_entity().ok_or_else(|| {
            DbError::MappingError(format!("Path '{}' does not lead to an entity", self))
        })
    }

    pub fn is_entity(&self) -> bool {
        self.data.leaf_entity.is_some()
    }

    pub fn is_embedded(&self) -> bool {
        self.leaf_property().is_some_and(|p| p.is_embedded())
    }

    /// True for the root and for every property that is stored in a table of its own.
    pub fn owns_table(&self) -> bool {
        self.is_root() || self.leaf_property().is_some_and(|p| p.is_table_backed())
    }

    pub fn is_multi_valued(&self) -> bool {
        self.is_qualified()
    }

    pub fn is_qualified(&self) -> bool {
        self.leaf_property().is_some_and(|p| p.is_qualified())
    }

    pub fn is_map(&self) -> bool {
        matches!(
            self.leaf_property().map(|p| &p.kind),
            Some(PropertyKind::Map { .. })
        )
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self.leaf_property().map(|p| &p.kind),
            Some(PropertyKind::List { .. })
        )
    }

    pub fn has_id_property(&self) -> bool {
        self.leaf_entity().is_some_and(|e| e.has_id_property())
    }

    /// Nearest ancestor whose entity declares an id (or the root).
    ///
    /// Embedded ancestors are skipped since they share their owner's row.
    pub fn id_defining_parent_path(&self) -> Result<&AggregatePath> {
        self.data.id_defining_parent.as_ref().ok_or_else(|| {
            DbError::MappingError(format!(
                "Root path '{}' has no id-defining parent",
                self
            ))
        })
    }

    /// Id property of the entity this path leads to.
    pub fn required_id_property(&self) -> Result<&PropertyDescriptor> {
        let entity = self.required_leaf_entity()?;
        entity.id_property().ok_or_else(|| {
            DbError::MappingError(format!(
                "Entity '{}' (path '{}') declares no id property",
                entity.name, self
            ))
        })
    }

    /// Nearest path (this one included) that owns a table.
    pub fn table_owner(&self) -> &AggregatePath {
        let mut current = self;
        while !current.owns_table() {
            match current.parent_path() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    pub fn table_info(&self) -> &TableInfo {
        &self.data.table_info
    }

    /// Column of a simple property, embedded prefixes applied.
    pub fn column_info(&self) -> Result<&ColumnInfo> {
        self.data.column_info.as_ref().ok_or_else(|| {
            DbError::MappingError(format!("Path '{}' does not map to a single column", self))
        })
    }

    /// Prefix applied to the columns of properties nested under this path.
    pub fn column_prefix(&self) -> &str {
        &self.data.column_prefix
    }
}

impl PartialEq for AggregatePath {
    fn eq(&self, other: &Self) -> bool {
        self.data.root.name == other.data.root.name && self.data.dotted == other.data.dotted
    }
}

impl Eq for AggregatePath {}

impl Hash for AggregatePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data.root.name.hash(state);
        self.data.dotted.hash(state);
    }
}

impl fmt::Display for AggregatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{}", self.data.root.name)
        } else {
            write!(f, "{}.{}", self.data.root.name, self.data.dotted)
        }
    }
}

/// Every path reachable from one root, indexed by dotted name.
#[derive(Debug)]
pub(crate) struct PathTree {
    root: AggregatePath,
    by_dotted: HashMap<String, AggregatePath>,
    children: HashMap<String, Vec<AggregatePath>>,
    order: Vec<AggregatePath>,
}

impl PathTree {
    pub(crate) fn root(&self) -> &AggregatePath {
        &self.root
    }

    pub(crate) fn get(&self, dotted: &str) -> Option<&AggregatePath> {
        if dotted.is_empty() {
            return Some(&self.root);
        }
        self.by_dotted.get(dotted)
    }

    pub(crate) fn children(&self, path: &AggregatePath) -> &[AggregatePath] {
        self.children
            .get(path.dotted_path())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All non-root paths in depth-first declaration order.
    pub(crate) fn paths(&self) -> &[AggregatePath] {
        &self.order
    }

    pub(crate) fn build(
        root: Arc<EntityDescriptor>,
        entities: &HashMap<String, Arc<EntityDescriptor>>,
        naming: &NamingStrategy,
    ) -> Result<Self> {
        let table_info = TableInfo {
            qualified_table_name: naming.qualified_table_name(&root),
            table_name: naming.table_name(&root),
            reverse_column_info: None,
            qualifier_column_info: None,
            qualifier_column_type: None,
            id_column_infos: id_columns(&root, entities, naming)?,
        };
        let root_path = AggregatePath {
            data: Arc::new(PathData {
                root: root.clone(),
                parent: None,
                property: None,
                leaf_entity: Some(root.clone()),
                id_defining_parent: None,
                dotted: String::new(),
                length: 0,
                table_info: Arc::new(table_info),
                column_info: None,
                column_prefix: String::new(),
            }),
        };

        let mut tree = PathTree {
            root: root_path.clone(),
            by_dotted: HashMap::new(),
            children: HashMap::new(),
            order: Vec::new(),
        };
        let mut ancestry = vec![root.name.clone()];
        tree.expand(&root_path, &mut ancestry, entities, naming)?;
        Ok(tree)
    }

    fn expand(
        &mut self,
        parent: &AggregatePath,
        ancestry: &mut Vec<String>,
        entities: &HashMap<String, Arc<EntityDescriptor>>,
        naming: &NamingStrategy,
    ) -> Result<()> {
        let owner = parent.required_leaf_entity()?.clone();
        let mut children = Vec::with_capacity(owner.properties.len());

        for property in &owner.properties {
            let child = child_path(parent, &owner, property, entities, naming)?;
            self.by_dotted
                .insert(child.dotted_path().to_string(), child.clone());
            self.order.push(child.clone());
            children.push(child.clone());

            if let Some(entity) = child.leaf_entity() {
                if ancestry.contains(&entity.name) {
                    return Err(DbError::MappingError(format!(
                        "Cyclic aggregate: '{}' is reachable from itself via '{}'",
                        entity.name, child
                    )));
                }
                ancestry.push(entity.name.clone());
                self.expand(&child, ancestry, entities, naming)?;
                ancestry.pop();
            }
        }

        self.children
            .insert(parent.dotted_path().to_string(), children);
        Ok(())
    }
}

fn lookup<'a>(
    entities: &'a HashMap<String, Arc<EntityDescriptor>>,
    name: &str,
) -> Result<&'a Arc<EntityDescriptor>> {
    entities
        .get(name)
        .ok_or_else(|| DbError::MappingError(format!("Unknown entity '{}'", name)))
}

fn id_defining_parent(parent: &AggregatePath) -> AggregatePath {
    let mut current = parent;
    loop {
        if current.is_root() || (!current.is_embedded() && current.has_id_property()) {
            return current.clone();
        }
        match current.parent_path() {
            Some(next) => current = next,
            None => return current.clone(),
        }
    }
}

fn id_columns(
    entity: &EntityDescriptor,
    entities: &HashMap<String, Arc<EntityDescriptor>>,
    naming: &NamingStrategy,
) -> Result<Vec<ColumnInfo>> {
    let Some(id) = entity.id_property() else {
        return Ok(Vec::new());
    };

    match &id.kind {
        PropertyKind::Simple { .. } => Ok(vec![ColumnInfo::new(naming.column_name(id))]),
        PropertyKind::Embedded {
            entity: embedded,
            prefix,
            ..
        } => {
            let embedded = lookup(entities, embedded)?;
            if embedded.properties.is_empty() {
                return Err(DbError::MappingError(format!(
                    "Embedded id '{}' of '{}' has no properties",
                    embedded.name, entity.name
                )));
            }
            let prefix = naming.embedded_prefix(prefix);
            embedded
                .properties
                .iter()
                .map(|p| {
                    if p.is_simple() {
                        Ok(ColumnInfo::new(format!("{}{}", prefix, naming.column_name(p))))
                    } else {
                        Err(DbError::MappingError(format!(
                            "Embedded id '{}' of '{}' may only contain simple properties, found '{}'",
                            embedded.name, entity.name, p.name
                        )))
                    }
                })
                .collect()
        }
        _ => Err(DbError::MappingError(format!(
            "Id property '{}' of '{}' must be simple or embedded",
            id.name, entity.name
        ))),
    }
}

fn child_path(
    parent: &AggregatePath,
    owner: &Arc<EntityDescriptor>,
    property: &PropertyDescriptor,
    entities: &HashMap<String, Arc<EntityDescriptor>>,
    naming: &NamingStrategy,
) -> Result<AggregatePath> {
    let dotted = if parent.is_root() {
        property.name.clone()
    } else {
        format!("{}.{}", parent.dotted_path(), property.name)
    };
    let leaf_entity = match property.target_entity() {
        Some(name) => Some(lookup(entities, name)?.clone()),
        None => None,
    };
    let id_parent = id_defining_parent(parent);

    let (table_info, column_info, column_prefix) = match &property.kind {
        PropertyKind::Simple { .. } => (
            parent.data.table_info.clone(),
            Some(ColumnInfo::new(format!(
                "{}{}",
                parent.column_prefix(),
                naming.column_name(property)
            ))),
            parent.column_prefix().to_string(),
        ),
        PropertyKind::Embedded { prefix, .. } => (
            parent.data.table_info.clone(),
            None,
            format!("{}{}", parent.column_prefix(), naming.embedded_prefix(prefix)),
        ),
        PropertyKind::Entity { .. } | PropertyKind::List { .. } | PropertyKind::Map { .. } => {
            let Some(leaf) = leaf_entity.as_ref() else {
                return Err(DbError::MappingError(format!(
                    "Property '{}' of '{}' has no target entity",
                    property.name, owner.name
                )));
            };
            let id_entity = id_parent.required_leaf_entity()?;
            let table_info = TableInfo {
                qualified_table_name: naming.qualified_table_name(leaf),
                table_name: naming.table_name(leaf),
                reverse_column_info: Some(ColumnInfo::new(
                    naming.reverse_column_name(property, id_entity),
                )),
                qualifier_column_info: property
                    .is_qualified()
                    .then(|| ColumnInfo::new(naming.key_column_name(property, owner))),
                qualifier_column_type: property.qualifier_type(),
                id_column_infos: id_columns(leaf, entities, naming)?,
            };
            (Arc::new(table_info), None, String::new())
        }
    };

    Ok(AggregatePath {
        data: Arc::new(PathData {
            root: parent.data.root.clone(),
            parent: Some(parent.clone()),
            property: Some(property.clone()),
            leaf_entity,
            id_defining_parent: Some(id_parent),
            dotted,
            length: parent.length() + 1,
            table_info,
            column_info,
            column_prefix,
        }),
    })
}
