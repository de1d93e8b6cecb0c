//! Trainable parameter registry

use crate::autograd::{zero_grad, Tensor};

/// Ordered list of the tensors an optimizer updates.
///
/// Holds cheap handles; registration order is the order the optimizer sees,
/// which keeps per-parameter optimizer state (momentum buffers) aligned.
#[derive(Default)]
pub struct ModelParams {
    params: Vec<Tensor>,
}

impl ModelParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, param: &Tensor) {
        self.params.push(param.clone());
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Zero every registered gradient accumulator.
    pub fn zero_grad(&self) {
        zero_grad(&self.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::AutogradAllocators;

    #[test]
    fn registration_preserves_order_and_identity() {
        let allocators = AutogradAllocators::new();
        let a = allocators.alloc(&[2, 1]).expect("alloc");
        let b = allocators.alloc(&[3, 1]).expect("alloc");

        let mut params = ModelParams::new();
        params.register(&a);
        params.register(&b);

        assert_eq!(params.len(), 2);
        assert!(params.tensors()[0].ptr_eq(&a));
        assert!(params.tensors()[1].ptr_eq(&b));
    }
}
