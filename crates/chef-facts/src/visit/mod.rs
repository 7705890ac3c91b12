//! visitor pattern helpers
mod visit_nodes;
pub use visit_nodes::VisitNodes;

/// Whether a visitor wants to see the children of the node it just visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

/// Visitor that is handed its subjects by value
pub trait Visit<T> {
    fn visit(&mut self, value: T) -> Walk;
}

// blanket impl for FnMut
impl<T, F> Visit<T> for F
where
    F: FnMut(T) -> Walk,
{
    fn visit(&mut self, value: T) -> Walk {
        self(value)
    }
}
