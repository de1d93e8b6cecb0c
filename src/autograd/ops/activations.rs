//! Activation functions

use crate::autograd::context::BackwardContext;
use crate::autograd::graph::add_link;
use crate::autograd::pool::AutogradAllocators;
use crate::autograd::tensor::Tensor;
use crate::{Error, Result};

/// Sole operand slot of an activation.
pub const RELU_OPERAND: usize = 0;

/// `out = max(0, x)` element-wise. `out` may alias `x`.
pub fn relu(x: &Tensor, out: &Tensor) -> Result<()> {
    if !x.same_shape(out) {
        return Err(Error::ShapeMismatch {
            expected: x.shape(),
            got: out.shape(),
        });
    }
    if x.ptr_eq(out) {
        for v in out.data_mut().iter_mut() {
            if *v < 0.0 {
                *v = 0.0;
            }
        }
        return Ok(());
    }
    let src = x.data();
    for (o, &v) in out.data_mut().iter_mut().zip(src.iter()) {
        *o = if v > 0.0 { v } else { 0.0 };
    }
    Ok(())
}

/// `relu` plus graph registration of its operand.
pub fn relu_graph(x: &Tensor, out: &Tensor, allocators: &AutogradAllocators) -> Result<()> {
    relu(x, out)?;
    add_link(x, RELU_OPERAND, out, relu_backward, allocators)
}

/// drelu(x)/dx gates the upstream gradient on the sign of the input:
/// element (i, j) of the output depends only on element (i, j) of x.
fn relu_backward(ctx: &BackwardContext<'_>, grad_out: &Tensor, grad_in: &Tensor) -> Result<()> {
    let x = ctx.operand(RELU_OPERAND)?;
    let src = x.data();
    let upstream = grad_out.data();
    for (g, (&v, &u)) in grad_in.data_mut().iter_mut().zip(src.iter().zip(upstream.iter())) {
        *g = if v > 0.0 { u } else { 0.0 };
    }
    Ok(())
}
