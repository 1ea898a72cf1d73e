use std::any::Any;
use std::fmt;

/// A node of the SQL syntax tree.
///
/// Rendering goes through `Display`; structure is exposed through
/// [`Segment::children`] so visitors can walk any node the same way.
pub trait Segment: fmt::Display + fmt::Debug {
    /// Direct children in render order.
    fn children(&self) -> Vec<&dyn Segment> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

pub trait SegmentVisitor {
    fn enter(&mut self, _segment: &dyn Segment) {}

    fn leave(&mut self, _segment: &dyn Segment) {}
}

/// Depth-first walk: `enter` on the way down, `leave` on the way up.
pub fn walk(segment: &dyn Segment, visitor: &mut dyn SegmentVisitor) {
    visitor.enter(segment);
    for child in segment.children() {
        walk(child, visitor);
    }
    visitor.leave(segment);
}
