//! Immutable SQL syntax nodes and the statement renderer built on them.

pub mod condition;
pub mod expression;
pub mod generator;
pub mod segment;
pub mod tuple;

pub use condition::{BindMarkerCollector, Condition};
pub use expression::{BindMarker, Column, Expression, Literal, Table};
pub use generator::SqlGenerator;
pub use segment::{Segment, SegmentVisitor, walk};
pub use tuple::TupleExpression;
