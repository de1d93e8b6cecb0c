//! Row-major matrix multiplication and transpose
//!
//! `matmul2d` is the pure kernel; `matmul2d_graph` additionally registers
//! the two operand links so gradients flow through the product. Backward
//! scratch (the transposed factor) comes from the context's allocator and
//! goes back to the pool before the rule returns.

use crate::autograd::context::BackwardContext;
use crate::autograd::graph::add_link;
use crate::autograd::pool::AutogradAllocators;
use crate::autograd::tensor::Tensor;
use crate::trace::{TraceStep, TRACER};
use crate::{Error, Result};

/// Operand slots of a matrix product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatmulOperand {
    Lhs = 0,
    Rhs = 1,
}

/// Write `a`'s transpose into `out`. Shapes must already agree; `out` must
/// not alias `a`.
pub fn transpose2d(a: &Tensor, out: &Tensor) -> Result<()> {
    let (rows, cols) = a.dims2()?;
    let (out_rows, out_cols) = out.dims2()?;
    if out_rows != cols || out_cols != rows {
        return Err(Error::ShapeMismatch {
            expected: vec![cols, rows],
            got: vec![out_rows, out_cols],
        });
    }

    let _span = TRACER.span(TraceStep::Transpose);
    let src = a.data();
    let mut dst = out.data_mut();
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
    Ok(())
}

/// `out = a @ b` for row-major rank-2 tensors. `out` must not alias the
/// factors.
pub fn matmul2d(a: &Tensor, b: &Tensor, out: &Tensor) -> Result<()> {
    let (m, k) = a.dims2()?;
    let (b_rows, n) = b.dims2()?;
    if b_rows != k {
        return Err(Error::ShapeMismatch {
            expected: vec![k, n],
            got: vec![b_rows, n],
        });
    }
    let (out_rows, out_cols) = out.dims2()?;
    if out_rows != m || out_cols != n {
        return Err(Error::ShapeMismatch {
            expected: vec![m, n],
            got: vec![out_rows, out_cols],
        });
    }

    let _span = TRACER.span(TraceStep::Matmul);
    matmul_unchecked(&a.data(), &b.data(), &mut out.data_mut(), m, k, n);
    Ok(())
}

fn matmul_unchecked(a: &[f64], b: &[f64], out: &mut [f64], m: usize, k: usize, n: usize) {
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0;
            for p in 0..k {
                acc += a[i * k + p] * b[p * n + j];
            }
            out[i * n + j] = acc;
        }
    }
}

/// `matmul2d` plus graph registration of both factors.
pub fn matmul2d_graph(
    a: &Tensor,
    b: &Tensor,
    out: &Tensor,
    allocators: &AutogradAllocators,
) -> Result<()> {
    matmul2d(a, b, out)?;
    add_link(a, MatmulOperand::Lhs as usize, out, matmul_backward_lhs, allocators)?;
    add_link(b, MatmulOperand::Rhs as usize, out, matmul_backward_rhs, allocators)
}

/// dL/dA = G @ Bᵀ
fn matmul_backward_lhs(
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let rhs = ctx.operand(MatmulOperand::Rhs as usize)?;
    let (k, n) = rhs.dims2()?;

    let rhs_t = ctx.allocator().alloc_no_grad(&[n, k])?;
    let result = transpose2d(rhs, &rhs_t).and_then(|()| matmul2d(grad_out, &rhs_t, grad_in));
    ctx.allocator().free_no_grad(&rhs_t);
    result
}

/// dL/dB = Aᵀ @ G
fn matmul_backward_rhs(
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let lhs = ctx.operand(MatmulOperand::Lhs as usize)?;
    let (m, k) = lhs.dims2()?;

    let lhs_t = ctx.allocator().alloc_no_grad(&[k, m])?;
    let result = transpose2d(lhs, &lhs_t).and_then(|()| matmul2d(&lhs_t, grad_out, grad_in));
    ctx.allocator().free_no_grad(&lhs_t);
    result
}
