//! Differentiable operations
//!
//! Each operator comes in two flavors: the pure kernel writing a
//! caller-allocated output, and a `_graph` variant that runs the kernel and
//! then records one link per operand with the matching backward rule.

mod activations;
mod basic;
mod matmul;

pub use activations::{relu, relu_graph, RELU_OPERAND};
pub use basic::{add, add_graph, add_row_vector, sum, sum_graph, AddOperand, SUM_OPERAND};
pub use matmul::{matmul2d, matmul2d_graph, transpose2d, MatmulOperand};
