//! The statement-level seam below the aggregate engine.

pub mod in_memory;
pub mod strategy;

pub use in_memory::{InMemoryDataAccessStrategy, JournalEntry, StatementKind};
pub use strategy::{DataAccessStrategy, IdGeneration};
