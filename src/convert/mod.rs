//! Identifiers and value conversion between documents and columns.

pub mod builder;
pub mod converter;
pub mod identifier;

pub use builder::IdentifierBuilder;
pub use converter::{EmbeddedIdDecomposition, MappingRelationalConverter, RelationalConverter};
pub use identifier::Identifier;
