//! Optimizer trait

use crate::autograd::Tensor;

/// Trait for optimization algorithms over pooled parameter tensors.
///
/// Parameters are shared handles, so `step` mutates them through interior
/// mutability; the slice itself is only read. Parameter order must stay
/// stable across calls — per-parameter optimizer state is index-aligned.
pub trait Optimizer {
    /// Apply one update from the parameters' current gradients. Parameters
    /// without a gradient are left untouched.
    fn step(&mut self, params: &[Tensor]);

    /// Zero out all gradient accumulators.
    fn zero_grad(&self, params: &[Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f64;

    /// Set learning rate
    fn set_lr(&mut self, lr: f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::AutogradAllocators;

    /// Minimal optimizer implementation for testing default trait methods
    struct TestOptimizer {
        learning_rate: f64,
    }

    impl Optimizer for TestOptimizer {
        fn step(&mut self, params: &[Tensor]) {
            for param in params {
                if let Some(grad) = param.grad() {
                    let g = grad.to_vec();
                    for (p, g) in param.data_mut().iter_mut().zip(g.iter()) {
                        *p -= self.learning_rate * g;
                    }
                }
            }
        }

        fn lr(&self) -> f64 {
            self.learning_rate
        }

        fn set_lr(&mut self, lr: f64) {
            self.learning_rate = lr;
        }
    }

    fn param_with_grad(allocators: &AutogradAllocators, data: &[f64], grad: &[f64]) -> Tensor {
        let p = allocators.alloc(&[data.len(), 1]).expect("alloc");
        p.data_mut().copy_from_slice(data);
        let g = allocators.tensors.alloc_no_grad(&[data.len(), 1]).expect("alloc");
        g.data_mut().copy_from_slice(grad);
        p.set_grad(g);
        p
    }

    #[test]
    fn step_applies_gradient_descent() {
        let allocators = AutogradAllocators::new();
        let p = param_with_grad(&allocators, &[1.0, 2.0], &[0.5, 1.0]);
        let mut opt = TestOptimizer { learning_rate: 0.1 };

        opt.step(&[p.clone()]);
        assert_eq!(&*p.data(), &[0.95, 1.9]);
    }

    #[test]
    fn step_skips_params_without_grad() {
        let allocators = AutogradAllocators::new();
        let p = allocators.alloc(&[2, 1]).expect("alloc");
        p.data_mut().copy_from_slice(&[1.0, 2.0]);
        let mut opt = TestOptimizer { learning_rate: 0.1 };

        opt.step(&[p.clone()]);
        assert_eq!(&*p.data(), &[1.0, 2.0]);
    }

    #[test]
    fn zero_grad_clears_accumulators() {
        let allocators = AutogradAllocators::new();
        let p = param_with_grad(&allocators, &[1.0], &[4.0]);
        let opt = TestOptimizer { learning_rate: 0.1 };

        opt.zero_grad(&[p.clone()]);
        assert_eq!(p.grad().expect("grad").data()[0], 0.0);
    }

    #[test]
    fn lr_is_adjustable() {
        let mut opt = TestOptimizer { learning_rate: 0.1 };
        assert_eq!(opt.lr(), 0.1);
        opt.set_lr(0.01);
        assert_eq!(opt.lr(), 0.01);
    }
}
