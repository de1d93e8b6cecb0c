//! Stochastic Gradient Descent optimizer

use super::Optimizer;
use crate::autograd::Tensor;

/// SGD with optional momentum:
/// `v = momentum * v - lr * grad; p += v`.
pub struct SGD {
    lr: f64,
    momentum: f64,
    velocities: Vec<Option<Vec<f64>>>,
}

impl SGD {
    pub fn new(lr: f64, momentum: f64) -> Self {
        Self {
            lr,
            momentum,
            velocities: Vec::new(),
        }
    }

    fn ensure_velocities(&mut self, count: usize) {
        if self.velocities.len() != count {
            self.velocities = (0..count).map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &[Tensor]) {
        self.ensure_velocities(params.len());

        for (i, param) in params.iter().enumerate() {
            let Some(grad) = param.grad() else { continue };
            let g = grad.data();

            if self.momentum > 0.0 {
                let velocity = self.velocities[i].get_or_insert_with(|| vec![0.0; g.len()]);
                if velocity.len() != g.len() {
                    velocity.resize(g.len(), 0.0);
                }
                let mut data = param.data_mut();
                for ((p, v), gi) in data.iter_mut().zip(velocity.iter_mut()).zip(g.iter()) {
                    *v = self.momentum * *v - self.lr * gi;
                    *p += *v;
                }
            } else {
                let mut data = param.data_mut();
                for (p, gi) in data.iter_mut().zip(g.iter()) {
                    *p -= self.lr * gi;
                }
            }
        }
    }

    fn lr(&self) -> f64 {
        self.lr
    }

    fn set_lr(&mut self, lr: f64) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::AutogradAllocators;
    use approx::assert_relative_eq;

    fn param_with_grad(allocators: &AutogradAllocators, data: &[f64], grad: &[f64]) -> Tensor {
        let p = allocators.alloc(&[data.len(), 1]).expect("alloc");
        p.data_mut().copy_from_slice(data);
        let g = allocators.tensors.alloc_no_grad(&[data.len(), 1]).expect("alloc");
        g.data_mut().copy_from_slice(grad);
        p.set_grad(g);
        p
    }

    #[test]
    fn plain_sgd_subtracts_scaled_gradient() {
        let allocators = AutogradAllocators::new();
        let p = param_with_grad(&allocators, &[1.0, 2.0], &[0.5, 1.0]);
        let mut opt = SGD::new(0.1, 0.0);

        opt.step(&[p.clone()]);
        assert_eq!(&*p.data(), &[0.95, 1.9]);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let allocators = AutogradAllocators::new();
        let p = param_with_grad(&allocators, &[1.0], &[1.0]);
        let mut opt = SGD::new(0.1, 0.9);

        // Step 1: v = -0.1, p = 0.9
        opt.step(&[p.clone()]);
        assert_relative_eq!(p.data()[0], 0.9, epsilon = 1e-12);

        // Step 2 with the same gradient: v = 0.9 * -0.1 - 0.1 = -0.19
        opt.step(&[p.clone()]);
        assert_relative_eq!(p.data()[0], 0.71, epsilon = 1e-12);
    }

    #[test]
    fn params_without_grad_are_untouched() {
        let allocators = AutogradAllocators::new();
        let p = allocators.alloc(&[2, 1]).expect("alloc");
        p.data_mut().copy_from_slice(&[3.0, 4.0]);
        let mut opt = SGD::new(0.1, 0.9);

        opt.step(&[p.clone()]);
        assert_eq!(&*p.data(), &[3.0, 4.0]);
    }
}
