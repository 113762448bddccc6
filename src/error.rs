use thiserror::Error;

/// Malformed inputs. Ordinary planning failures (blocked goal, no path) are not errors; they are
/// reported through [PlanResult](crate::PlanResult) diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{what} has {found} dimensions but the grid has {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("grid shape {shape:?} needs {expected} cells, got {found}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[error("grid must have at least one dimension")]
    EmptyShape,
    #[error("row {row} has length {found}, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
}
