//! Loss functions
//!
//! Both losses produce a scalar `(1, 1)` output and register their operand
//! links in the `_graph` variants. Their backward rules treat the loss as
//! the traversal root: the upstream gradient is the all-ones seed, so the
//! rules write the local derivative directly.

use crate::autograd::{add_link, AutogradAllocators, BackwardContext, Tensor};
use crate::{Error, Result};

/// Operand slots of the mean-squared-error loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MseOperand {
    Predicted = 0,
    Target = 1,
}

/// Operand slots of the softmax cross-entropy loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossEntropyOperand {
    Logits = 0,
    Targets = 1,
}

/// Mean squared error over `(batch, 1)` column vectors:
/// `loss = mean(0.5 * (pred - target)^2)`.
pub fn mse_loss(y_pred: &Tensor, y_target: &Tensor, loss: &Tensor) -> Result<()> {
    if y_pred.len() != y_target.len() {
        return Err(Error::DataSizeMismatch {
            expected: y_pred.len(),
            got: y_target.len(),
        });
    }
    if !y_pred.same_shape(y_target) {
        return Err(Error::ShapeMismatch {
            expected: y_pred.shape(),
            got: y_target.shape(),
        });
    }
    let (batch, cols) = y_pred.dims2()?;
    if cols != 1 {
        return Err(Error::WrongShape(format!(
            "mse operands must be column vectors, got shape {:?}",
            y_pred.shape()
        )));
    }
    if loss.len() != 1 {
        return Err(Error::WrongShape(format!(
            "loss output must be scalar, got shape {:?}",
            loss.shape()
        )));
    }

    let pred = y_pred.data();
    let target = y_target.data();
    let mut acc = 0.0;
    for i in 0..batch {
        let difference = pred[i] - target[i];
        acc += 0.5 * difference * difference;
    }
    loss.data_mut()[0] = acc / batch as f64;
    Ok(())
}

/// `mse_loss` plus graph registration of both operands.
pub fn mse_loss_graph(
    y_pred: &Tensor,
    y_target: &Tensor,
    loss: &Tensor,
    allocators: &AutogradAllocators,
) -> Result<()> {
    mse_loss(y_pred, y_target, loss)?;
    add_link(y_pred, MseOperand::Predicted as usize, loss, mse_backward_predicted, allocators)?;
    add_link(y_target, MseOperand::Target as usize, loss, mse_backward_target, allocators)
}

fn mse_backward_predicted(
    ctx: &BackwardContext<'_>,
    _grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let predicted = ctx.operand(MseOperand::Predicted as usize)?;
    let target = ctx.operand(MseOperand::Target as usize)?;
    let batch = predicted.shape()[0];

    let pred = predicted.data();
    let tgt = target.data();
    let mut dst = grad_in.data_mut();
    for i in 0..batch {
        dst[i] = (pred[i] - tgt[i]) / batch as f64;
    }
    Ok(())
}

/// Same rule as the predicted side with the sign flipped.
fn mse_backward_target(
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    mse_backward_predicted(ctx, grad_out, grad_in)?;
    for g in grad_in.data_mut().iter_mut() {
        *g = -*g;
    }
    Ok(())
}

/// Softmax cross-entropy with class-index targets.
///
/// `logits` is `(batch, classes)`; `targets` is a `(batch, 1)` column of
/// class indices stored as floats. The loss is the mean negative
/// log-likelihood over the batch, computed with a max-shifted log-sum-exp.
pub fn cross_entropy_loss(logits: &Tensor, targets: &Tensor, loss: &Tensor) -> Result<()> {
    let (batch, classes) = logits.dims2()?;
    let (target_rows, target_cols) = targets.dims2()?;
    if target_rows != batch || target_cols != 1 {
        return Err(Error::ShapeMismatch {
            expected: vec![batch, 1],
            got: vec![target_rows, target_cols],
        });
    }
    if loss.len() != 1 {
        return Err(Error::WrongShape(format!(
            "loss output must be scalar, got shape {:?}",
            loss.shape()
        )));
    }

    let z = logits.data();
    let t = targets.data();
    let mut acc = 0.0;
    for i in 0..batch {
        let row = &z[i * classes..(i + 1) * classes];
        let class = class_index(t[i], i, classes)?;

        let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum_exp = max + row.iter().map(|&v| (v - max).exp()).sum::<f64>().ln();
        acc += log_sum_exp - row[class];
    }
    loss.data_mut()[0] = acc / batch as f64;
    Ok(())
}

/// `cross_entropy_loss` plus graph registration of both operands.
pub fn cross_entropy_loss_graph(
    logits: &Tensor,
    targets: &Tensor,
    loss: &Tensor,
    allocators: &AutogradAllocators,
) -> Result<()> {
    cross_entropy_loss(logits, targets, loss)?;
    add_link(
        logits,
        CrossEntropyOperand::Logits as usize,
        loss,
        cross_entropy_backward_logits,
        allocators,
    )?;
    add_link(
        targets,
        CrossEntropyOperand::Targets as usize,
        loss,
        cross_entropy_backward_targets,
        allocators,
    )
}

/// dL/dz = (softmax(z) - onehot(target)) / batch
fn cross_entropy_backward_logits(
    ctx: &BackwardContext<'_>,
    _grad_out: &Tensor,
    grad_in: &Tensor,
) -> Result<()> {
    let logits = ctx.operand(CrossEntropyOperand::Logits as usize)?;
    let targets = ctx.operand(CrossEntropyOperand::Targets as usize)?;
    let (batch, classes) = logits.dims2()?;

    let z = logits.data();
    let t = targets.data();
    let mut dst = grad_in.data_mut();
    for i in 0..batch {
        let row = &z[i * classes..(i + 1) * classes];
        let class = class_index(t[i], i, classes)?;

        let max = row.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let denom: f64 = row.iter().map(|&v| (v - max).exp()).sum();
        for j in 0..classes {
            let softmax = (row[j] - max).exp() / denom;
            let onehot = if j == class { 1.0 } else { 0.0 };
            dst[i * classes + j] = (softmax - onehot) / batch as f64;
        }
    }
    Ok(())
}

/// Class indices are not differentiable; their gradient stays zero.
fn cross_entropy_backward_targets(
    _ctx: &BackwardContext<'_>,
    _grad_out: &Tensor,
    _grad_in: &Tensor,
) -> Result<()> {
    Ok(())
}

fn class_index(value: f64, row: usize, classes: usize) -> Result<usize> {
    let class = value as usize;
    if value < 0.0 || class >= classes {
        return Err(Error::IndexOutOfBounds {
            row,
            col: class,
            shape: vec![classes],
        });
    }
    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::{backward, zero_grad, AutogradAllocators};
    use approx::assert_relative_eq;

    fn column(allocators: &AutogradAllocators, values: &[f64]) -> Tensor {
        let t = allocators.alloc(&[values.len(), 1]).expect("alloc");
        t.data_mut().copy_from_slice(values);
        t
    }

    #[test]
    fn mse_forward_and_gradients() {
        let allocators = AutogradAllocators::new();
        let y_pred = column(&allocators, &[1.0, 2.0, 3.0, 4.0]);
        let y_target = column(&allocators, &[1.0, 1.0, 1.0, 1.0]);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");

        mse_loss_graph(&y_pred, &y_target, &loss, &allocators).expect("mse");
        assert_relative_eq!(loss.data()[0], 1.75, epsilon = 1e-12);

        backward(&loss, &allocators).expect("backward");
        let pred_grad = y_pred.grad().expect("pred gradient");
        assert_eq!(&*pred_grad.data(), &[0.0, 0.25, 0.5, 0.75]);
        let target_grad = y_target.grad().expect("target gradient");
        assert_eq!(&*target_grad.data(), &[0.0, -0.25, -0.5, -0.75]);
    }

    #[test]
    fn mse_rejects_wide_operands() {
        let allocators = AutogradAllocators::new();
        let y_pred = allocators.alloc(&[2, 2]).expect("alloc");
        y_pred.fill(0.0);
        let y_target = allocators.alloc(&[2, 2]).expect("alloc");
        y_target.fill(0.0);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");
        assert!(matches!(
            mse_loss(&y_pred, &y_target, &loss),
            Err(Error::WrongShape(_))
        ));
    }

    #[test]
    fn cross_entropy_uniform_logits_is_log_classes() {
        let allocators = AutogradAllocators::new();
        let logits = allocators.alloc(&[2, 4]).expect("alloc");
        logits.fill(0.0);
        let targets = column(&allocators, &[0.0, 3.0]);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");

        cross_entropy_loss(&logits, &targets, &loss).expect("cross entropy");
        assert_relative_eq!(loss.data()[0], 4.0f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn cross_entropy_gradient_sums_to_zero_per_row() {
        let allocators = AutogradAllocators::new();
        let logits = allocators.alloc(&[2, 3]).expect("alloc");
        logits.data_mut().copy_from_slice(&[0.5, -1.0, 2.0, 1.0, 1.0, 1.0]);
        let targets = column(&allocators, &[2.0, 0.0]);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");

        cross_entropy_loss_graph(&logits, &targets, &loss, &allocators).expect("cross entropy");
        backward(&loss, &allocators).expect("backward");

        let grad = logits.grad().expect("logits gradient");
        let g = grad.data();
        for i in 0..2 {
            let row_sum: f64 = g[i * 3..(i + 1) * 3].iter().sum();
            assert_relative_eq!(row_sum, 0.0, epsilon = 1e-12);
        }
        // The target class pulls its logit up, the rest push down.
        assert!(g[2] < 0.0);
        assert!(g[0] > 0.0 && g[1] > 0.0);

        let target_grad = targets.grad().expect("targets gradient");
        assert_eq!(&*target_grad.data(), &[0.0, 0.0]);
        zero_grad(&[logits.clone()]);
        assert_eq!(&*grad.data(), &[0.0; 6]);
    }

    #[test]
    fn cross_entropy_rejects_out_of_range_class() {
        let allocators = AutogradAllocators::new();
        let logits = allocators.alloc(&[1, 3]).expect("alloc");
        logits.fill(0.0);
        let targets = column(&allocators, &[3.0]);
        let loss = allocators.alloc(&[1, 1]).expect("alloc");
        assert!(matches!(
            cross_entropy_loss(&logits, &targets, &loss),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }
}
