use std::any::Any;
use std::fmt;

use super::expression::{BindMarker, Expression};
use super::segment::{Segment, SegmentVisitor};

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `left = right`
    Comparison { left: Expression, right: Expression },
    /// Conditions joined with `AND`.
    And(Vec<Condition>),
    /// `left IN (v1, v2, ...)`
    In {
        left: Expression,
        values: Vec<Expression>,
    },
}

impl Condition {
    pub fn is_equal(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        Self::Comparison {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut conditions) => {
                conditions.push(other);
                Self::And(conditions)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn is_in(left: impl Into<Expression>, values: impl IntoIterator<Item = Expression>) -> Self {
        Self::In {
            left: left.into(),
            values: values.into_iter().collect(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison { left, right } => write!(f, "{} = {}", left, right),
            Self::And(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" AND "))
            }
            Self::In { left, values } => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} IN ({})", left, parts.join(", "))
            }
        }
    }
}

impl Segment for Condition {
    fn children(&self) -> Vec<&dyn Segment> {
        match self {
            Self::Comparison { left, right } => vec![left as &dyn Segment, right],
            Self::And(conditions) => conditions.iter().map(|c| c as &dyn Segment).collect(),
            Self::In { left, values } => std::iter::once(left as &dyn Segment)
                .chain(values.iter().map(|v| v as &dyn Segment))
                .collect(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collects bind parameter names in render order.
#[derive(Debug, Default)]
pub struct BindMarkerCollector {
    names: Vec<String>,
}

impl BindMarkerCollector {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

impl SegmentVisitor for BindMarkerCollector {
    fn enter(&mut self, segment: &dyn Segment) {
        if let Some(marker) = segment.as_any().downcast_ref::<BindMarker>() {
            self.names.push(marker.name().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{Column, TupleExpression, walk};

    #[test]
    fn test_render_conditions() {
        let condition = Condition::is_equal(Column::new("lego_set"), BindMarker::new("lego_set"))
            .and(Condition::is_equal(
                Column::new("lego_set_key"),
                BindMarker::new("lego_set_key"),
            ));
        assert_eq!(
            condition.to_string(),
            "lego_set = :lego_set AND lego_set_key = :lego_set_key"
        );
    }

    #[test]
    fn test_tuple_in_condition_collects_markers() {
        let condition = Condition::is_in(
            TupleExpression::of([Expression::column("region"), Expression::column("number")]),
            (0..2).map(|i| {
                Expression::Tuple(TupleExpression::of([
                    Expression::bind(format!("region{}", i)),
                    Expression::bind(format!("number{}", i)),
                ]))
            }),
        );
        assert_eq!(
            condition.to_string(),
            "(region, number) IN ((:region0, :number0), (:region1, :number1))"
        );

        let mut collector = BindMarkerCollector::default();
        walk(&condition, &mut collector);
        assert_eq!(
            collector.into_names(),
            vec!["region0", "number0", "region1", "number1"]
        );
    }
}
