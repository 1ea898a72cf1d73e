use std::any::Any;
use std::fmt;

use super::expression::Expression;
use super::segment::Segment;

/// Parenthesised, comma-separated expressions, as in `WHERE (a, b) IN (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleExpression {
    expressions: Vec<Expression>,
}

impl TupleExpression {
    pub fn of<const N: usize>(expressions: [Expression; N]) -> Self {
        Self {
            expressions: Vec::from(expressions),
        }
    }

    pub fn create(expressions: impl IntoIterator<Item = Expression>) -> Self {
        Self {
            expressions: expressions.into_iter().collect(),
        }
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }
}

impl FromIterator<Expression> for TupleExpression {
    fn from_iter<I: IntoIterator<Item = Expression>>(iter: I) -> Self {
        Self::create(iter)
    }
}

impl fmt::Display for TupleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.expressions.iter().map(|e| e.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl Segment for TupleExpression {
    fn children(&self) -> Vec<&dyn Segment> {
        self.expressions.iter().map(|e| e as &dyn Segment).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
