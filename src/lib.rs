// ============================================================================
// rustrelmap Library
// ============================================================================

//! Persists aggregate object graphs (a root entity plus the entities,
//! lists and maps it owns) to relational tables.
//!
//! Aggregate shapes are declared with [`EntityDescriptor`]s and registered
//! once into a [`MappingContext`]. An [`AggregateTemplate`] walks the
//! aggregate through its [`AggregatePath`]s and issues table-level
//! statements against a [`DataAccessStrategy`].
//!
//! ```
//! use std::sync::Arc;
//! use rustrelmap::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Team {
//!     id: Option<i64>,
//!     name: String,
//!     members: Vec<Member>,
//! }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Member {
//!     name: String,
//! }
//!
//! impl Aggregate for Team {
//!     const ENTITY: &'static str = "Team";
//! }
//!
//! # fn main() -> rustrelmap::Result<()> {
//! let context = Arc::new(
//!     MappingContext::builder()
//!         .register(
//!             EntityDescriptor::new("Team")
//!                 .id("id", SqlType::Integer)
//!                 .property("name", SqlType::Text)
//!                 .list("members", "Member"),
//!         )
//!         .register(EntityDescriptor::new("Member").property("name", SqlType::Text))
//!         .build()?,
//! );
//! let store = InMemoryDataAccessStrategy::for_context(&context);
//! let template = AggregateTemplate::new(context, store);
//!
//! let team = template.insert(Team {
//!     id: None,
//!     name: "core".into(),
//!     members: vec![Member { name: "Ada".into() }],
//! })?;
//! let loaded: Option<Team> = template.find_by_id(&team.id)?;
//! assert_eq!(loaded.map(|t| t.members.len()), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod convert;
pub mod core;
pub mod mapping;
pub mod prelude;
pub mod sql;
pub mod template;

// Re-export main types for convenience
pub use access::{DataAccessStrategy, IdGeneration, InMemoryDataAccessStrategy};
pub use convert::{Identifier, IdentifierBuilder, MappingRelationalConverter, RelationalConverter};
pub use crate::core::{DbError, Result, SqlType, Value};
pub use mapping::{AggregatePath, EntityDescriptor, MappingConfig, MappingContext, PropertyDescriptor};
pub use sql::{SqlGenerator, TupleExpression};
pub use template::{
    Aggregate, AggregateEvent, AggregateEventKind, AggregateEventListener, AggregateOperations,
    AggregateTemplate,
};
