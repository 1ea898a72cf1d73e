//! The aggregate persistence engine.

pub mod aggregate;
mod deleter;
mod document;
pub mod events;
mod reader;
#[allow(clippy::module_inception)]
pub mod template;
mod writer;

pub use aggregate::{Aggregate, AggregateOperations};
pub use events::{AggregateEvent, AggregateEventKind, AggregateEventListener};
pub use template::AggregateTemplate;
