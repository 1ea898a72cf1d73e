//! Recommended imports.
//!
//! `use rustrelmap::prelude::*` brings in everything needed to declare
//! aggregates and persist them. `advanced` groups the lower-level seams.

pub use crate::access::InMemoryDataAccessStrategy;
pub use crate::core::{DbError, Result, SqlType};
pub use crate::mapping::{EntityDescriptor, MappingConfig, MappingContext, OnEmpty, PropertyDescriptor};
pub use crate::template::{
    Aggregate, AggregateEvent, AggregateEventKind, AggregateEventListener, AggregateOperations,
    AggregateTemplate,
};

pub mod advanced {
    //! Escape hatch for custom stores and path-level work.
    pub use crate::access::{DataAccessStrategy, IdGeneration, JournalEntry, StatementKind};
    pub use crate::convert::{
        EmbeddedIdDecomposition, Identifier, IdentifierBuilder, MappingRelationalConverter,
        RelationalConverter,
    };
    pub use crate::mapping::{AggregatePath, ColumnInfo, TableInfo};
    pub use crate::sql::{Condition, Expression, Segment, SegmentVisitor, SqlGenerator, TupleExpression};
}
