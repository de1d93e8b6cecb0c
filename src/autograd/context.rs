//! Backpropagation context handed to backward rules

use crate::config::MAX_OPERANDS;
use crate::{Error, Result};

use super::graph::Snapshot;
use super::pool::TensorPool;
use super::tensor::Tensor;

/// A per-operand gradient rule.
///
/// Receives the context of the consumer's operation, the gradient flowing
/// into the consumer (`grad_out`), and a zero-initialized tensor of the
/// operand's shape (`grad_in`) to write the partial derivative into.
pub type BackwardFn = fn(&BackwardContext<'_>, &Tensor, &Tensor) -> Result<()>;

/// What a backward rule can see: the operand snapshot of the consumer's
/// operation and a tensor allocator for scratch.
pub struct BackwardContext<'a> {
    operands: [Option<Tensor>; MAX_OPERANDS],
    allocator: &'a TensorPool,
}

impl<'a> BackwardContext<'a> {
    pub(crate) fn new(snapshot: &Snapshot, allocator: &'a TensorPool) -> Self {
        Self {
            operands: snapshot.borrow().clone(),
            allocator,
        }
    }

    /// The operand recorded in `slot`, or [`Error::MissingOperand`] if the
    /// producing operation never filled it.
    pub fn operand(&self, slot: usize) -> Result<&Tensor> {
        self.operands
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(Error::MissingOperand(slot))
    }

    /// Allocator for backward scratch tensors.
    pub fn allocator(&self) -> &TensorPool {
        self.allocator
    }
}
