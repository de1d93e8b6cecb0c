//! Fully-connected layer
//!
//! `out = x @ W + b` with `W: (in_dim, out_dim)` and `b: (out_dim, 1)`
//! broadcast across the rows of the batch. Both parameters are
//! gradient-tracked pool tensors owned by the layer until [`Linear::release`].

use crate::autograd::ops::{add_row_vector, matmul2d, transpose2d};
use crate::autograd::{add_link, AutogradAllocators, BackwardContext, Tensor};
use crate::trace::{TraceStep, TRACER};
use crate::Result;
use rand::Rng;

/// Operand slots of the linear transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearOperand {
    Input = 0,
    Weights = 1,
    Bias = 2,
}

pub struct Linear {
    weights: Tensor,
    biases: Tensor,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    /// Allocate a layer with zeroed parameters.
    pub fn new(in_dim: usize, out_dim: usize, allocators: &AutogradAllocators) -> Result<Self> {
        let weights = allocators.alloc(&[in_dim, out_dim])?;
        weights.fill(0.0);
        let biases = allocators.alloc(&[out_dim, 1])?;
        biases.fill(0.0);
        Ok(Self { weights, biases, in_dim, out_dim })
    }

    /// Xavier-uniform weight initialization, `U(-b, b)` with
    /// `b = sqrt(6 / (in_dim + out_dim))`.
    pub fn xavier_init<R: Rng>(&self, rng: &mut R) {
        let bound = (6.0 / (self.in_dim + self.out_dim) as f64).sqrt();
        for w in self.weights.data_mut().iter_mut() {
            *w = rng.gen_range(-bound..bound);
        }
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Pure forward: `out = x @ W + b`.
    pub fn forward(&self, x: &Tensor, out: &Tensor) -> Result<()> {
        let _span = TRACER.span(TraceStep::Forward);
        matmul2d(x, &self.weights, out)?;
        add_row_vector(out, &self.biases, out)
    }

    /// Forward plus graph registration of all three operands.
    pub fn forward_graph(
        &self,
        x: &Tensor,
        out: &Tensor,
        allocators: &AutogradAllocators,
    ) -> Result<()> {
        self.forward(x, out)?;
        add_link(x, LinearOperand::Input as usize, out, linear_backward_input, allocators)?;
        add_link(
            &self.weights,
            LinearOperand::Weights as usize,
            out,
            linear_backward_weights,
            allocators,
        )?;
        add_link(
            &self.biases,
            LinearOperand::Bias as usize,
            out,
            linear_backward_bias,
            allocators,
        )
    }

    /// Return the parameter tensors to the pool.
    pub fn release(&self, allocators: &AutogradAllocators) {
        allocators.free(&self.weights);
        allocators.free(&self.biases);
    }
}

/// dL/dx = G @ Wᵀ
fn linear_backward_input(
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let weights = ctx.operand(LinearOperand::Weights as usize)?;
    let (rows, cols) = weights.dims2()?;

    let weights_t = ctx.allocator().alloc_no_grad(&[cols, rows])?;
    let result =
        transpose2d(weights, &weights_t).and_then(|()| matmul2d(grad_out, &weights_t, grad_in));
    ctx.allocator().free_no_grad(&weights_t);
    result
}

/// dL/dW = xᵀ @ G
fn linear_backward_weights(
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let input = ctx.operand(LinearOperand::Input as usize)?;
    let (rows, cols) = input.dims2()?;

    let input_t = ctx.allocator().alloc_no_grad(&[cols, rows])?;
    let result = transpose2d(input, &input_t).and_then(|()| matmul2d(&input_t, grad_out, grad_in));
    ctx.allocator().free_no_grad(&input_t);
    result
}

/// dL/db sums the upstream gradient over the batch dimension.
fn linear_backward_bias(
    _ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let (rows, cols) = grad_out.dims2()?;
    let upstream = grad_out.data();
    let mut dst = grad_in.data_mut();
    for i in 0..rows {
        for j in 0..cols {
            dst[j] += upstream[i * cols + j];
        }
    }
    Ok(())
}
