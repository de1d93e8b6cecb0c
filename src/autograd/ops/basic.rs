//! Element-wise add, row-vector broadcast add, and sum

use crate::autograd::context::BackwardContext;
use crate::autograd::graph::add_link;
use crate::autograd::pool::AutogradAllocators;
use crate::autograd::tensor::Tensor;
use crate::{Error, Result};

/// Operand slots of an element-wise add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOperand {
    Lhs = 0,
    Rhs = 1,
}

/// Sole operand slot of a unary reduction.
pub const SUM_OPERAND: usize = 0;

/// `out = a + b` element-wise. `out` may alias either addend.
pub fn add(a: &Tensor, b: &Tensor, out: &Tensor) -> Result<()> {
    if !a.same_shape(b) {
        return Err(Error::ShapeMismatch {
            expected: a.shape(),
            got: b.shape(),
        });
    }
    if out.ptr_eq(b) && !out.ptr_eq(a) {
        return out.add_inplace(a);
    }
    out.copy_from(a)?;
    out.add_inplace(b)
}

/// `add` plus graph registration of both addends.
pub fn add_graph(a: &Tensor, b: &Tensor, out: &Tensor, allocators: &AutogradAllocators) -> Result<()> {
    add(a, b, out)?;
    add_link(a, AddOperand::Lhs as usize, out, add_backward, allocators)?;
    add_link(b, AddOperand::Rhs as usize, out, add_backward, allocators)
}

/// d(a+b)/da = d(a+b)/db = 1: the upstream gradient passes through
/// unchanged, so one rule serves both slots.
fn add_backward(_ctx: &BackwardContext<'_>, grad_out: &Tensor, grad_in: &Tensor) -> Result<()> {
    grad_in.copy_from(grad_out)
}

/// `out[i][j] = x[i][j] + v[j]`, broadcasting `v` across rows. `v` carries
/// one element per column of `x`; `out` may alias `x`.
pub fn add_row_vector(x: &Tensor, v: &Tensor, out: &Tensor) -> Result<()> {
    let (rows, cols) = x.dims2()?;
    if v.len() != cols {
        return Err(Error::DataSizeMismatch {
            expected: cols,
            got: v.len(),
        });
    }
    if !x.same_shape(out) {
        return Err(Error::ShapeMismatch {
            expected: x.shape(),
            got: out.shape(),
        });
    }

    out.copy_from(x)?;
    let vec = v.to_vec();
    let mut dst = out.data_mut();
    for i in 0..rows {
        for j in 0..cols {
            dst[i * cols + j] += vec[j];
        }
    }
    Ok(())
}

/// `out` becomes the scalar total of `x`. `out` must have one element.
pub fn sum(x: &Tensor, out: &Tensor) -> Result<()> {
    if out.len() != 1 {
        return Err(Error::WrongShape(format!(
            "sum output must be scalar, got shape {:?}",
            out.shape()
        )));
    }
    let total: f64 = x.data().iter().sum();
    out.data_mut()[0] = total;
    Ok(())
}

/// `sum` plus graph registration of its operand.
pub fn sum_graph(x: &Tensor, out: &Tensor, allocators: &AutogradAllocators) -> Result<()> {
    sum(x, out)?;
    add_link(x, SUM_OPERAND, out, sum_backward, allocators)
}

/// d(Σx)/dx broadcasts the scalar upstream gradient to every element.
fn sum_backward(_ctx: &BackwardContext<'_>, grad_out: &Tensor, grad_in: &Tensor) -> Result<()> {
    let g = grad_out.data()[0];
    for x in grad_in.data_mut().iter_mut() {
        *x = g;
    }
    Ok(())
}
