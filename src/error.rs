//! Error types for derivar

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Element count mismatch: expected {expected}, got {got}")]
    DataSizeMismatch { expected: usize, got: usize },

    #[error("Wrong shape: {0}")]
    WrongShape(String),

    #[error("Index ({row}, {col}) out of bounds for shape {shape:?}")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        shape: Vec<usize>,
    },

    #[error("Operand slot {0} is empty")]
    MissingOperand(usize),

    #[error("Operand is not gradient-tracked")]
    MissingNode,

    #[error("Allocation failed: pool exhausted")]
    OutOfMemory,

    #[error("Backward root is not gradient-tracked")]
    InvalidRoot,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;
