use std::any::Any;
use std::fmt;

use crate::core::Value;

use super::segment::Segment;
use super::tuple::TupleExpression;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column(&self, name: impl Into<String>) -> Column {
        Column::new(name).qualified_by(self.name.clone())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Segment for Table {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    table: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
        }
    }

    pub fn qualified_by(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Segment for Column {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Named bind parameter, rendered as `:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMarker {
    name: String,
}

impl BindMarker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for BindMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name)
    }
}

impl Segment for BindMarker {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal(pub Value);

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Segment for Literal {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Any value-producing node.
///
/// The wrapper is transparent: rendering, children and downcasting all go to
/// the wrapped node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(Column),
    BindMarker(BindMarker),
    Literal(Literal),
    Tuple(TupleExpression),
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(Column::new(name))
    }

    pub fn bind(name: impl Into<String>) -> Self {
        Self::BindMarker(BindMarker::new(name))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(Literal(value.into()))
    }

    fn inner(&self) -> &dyn Segment {
        match self {
            Self::Column(c) => c,
            Self::BindMarker(b) => b,
            Self::Literal(l) => l,
            Self::Tuple(t) => t,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Segment for Expression {
    fn children(&self) -> Vec<&dyn Segment> {
        self.inner().children()
    }

    fn as_any(&self) -> &dyn Any {
        self.inner().as_any()
    }
}

impl From<Column> for Expression {
    fn from(c: Column) -> Self {
        Self::Column(c)
    }
}

impl From<BindMarker> for Expression {
    fn from(b: BindMarker) -> Self {
        Self::BindMarker(b)
    }
}

impl From<Literal> for Expression {
    fn from(l: Literal) -> Self {
        Self::Literal(l)
    }
}

impl From<TupleExpression> for Expression {
    fn from(t: TupleExpression) -> Self {
        Self::Tuple(t)
    }
}
