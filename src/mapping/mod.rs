//! Aggregate shape: entity descriptors, naming and the path model.

pub mod context;
pub mod descriptor;
pub mod naming;
pub mod path;

pub use context::{MappingContext, MappingContextBuilder, SchemaDocument};
pub use descriptor::{EntityDescriptor, OnEmpty, PropertyDescriptor, PropertyKind};
pub use naming::{MappingConfig, NamingStrategy};
pub use path::{AggregatePath, ColumnInfo, TableInfo};
