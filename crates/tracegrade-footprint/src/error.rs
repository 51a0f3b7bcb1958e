use thiserror::Error;

/// Errors raised while building or querying a memory footprint.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FootprintError {
    #[error("footprint index out of range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("array shape {shape:?} does not match {len} data elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    #[error("matrix row {row} has {found} elements, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("table row {row} has {found} cells, expected {expected}")]
    RaggedTable {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Convenience type alias for footprint results.
pub type FootprintResult<T> = Result<T, FootprintError>;
