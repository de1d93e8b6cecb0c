//! Reverse-mode backward traversal
//!
//! Walks the computational graph from a root tensor in reverse-topological
//! order and accumulates each edge's contribution into its operand's
//! gradient. A consumer is always finalized before any of its operands is
//! visited, so every gradient a backward rule reads is complete.

use crate::trace::{TraceStep, TRACER};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

use super::context::{BackwardContext, BackwardFn};
use super::graph::distinct_operands;
use super::pool::{AutogradAllocators, TensorPool};
use super::tensor::Tensor;

/// Zero the gradient accumulators of `params` in place.
///
/// Gradients accumulate additively across backward passes; call this before
/// each pass that should start from a clean slate.
pub fn zero_grad(params: &[Tensor]) {
    for param in params {
        param.zero_grad();
    }
}

/// Compute partial derivatives of `root` with respect to every tracked
/// tensor in its reachable subgraph, summing them into the operands'
/// gradient accumulators.
///
/// The root's gradient is seeded with ones (overwriting any previous
/// value); non-scalar roots are accepted and seeded the same way. On
/// allocation failure the traversal aborts and partially-accumulated
/// gradients are left in place.
pub fn backward(root: &Tensor, allocators: &AutogradAllocators) -> Result<()> {
    let _span = TRACER.span(TraceStep::Backward);
    run_backward(root, allocators)
}

fn run_backward(root: &Tensor, allocators: &AutogradAllocators) -> Result<()> {
    if root.node().is_none() {
        return Err(Error::InvalidRoot);
    }

    seed_root(root, &allocators.tensors)?;

    // Pass 1: walk upstream through operand snapshots to find the reachable
    // subgraph and, per tensor, how many of its outgoing links target a
    // reachable consumer.
    let mut pending: HashMap<usize, (Tensor, usize)> = HashMap::new();
    let mut expanded: HashSet<usize> = HashSet::new();
    let mut stack = vec![root.clone()];
    pending.insert(root.key(), (root.clone(), 0));

    while let Some(consumer) = stack.pop() {
        if !expanded.insert(consumer.key()) {
            continue;
        }
        let Some(snapshot) = consumer.node().and_then(|n| n.snapshot()) else {
            continue;
        };
        for operand in distinct_operands(&snapshot) {
            let node = operand.node().ok_or(Error::MissingNode)?;
            let links = node.links_to(&consumer);
            let entry = pending.entry(operand.key()).or_insert((operand.clone(), 0));
            entry.1 += links;
            stack.push(operand);
        }
    }

    // Pass 2: visit consumers whose downstream contributions are all summed,
    // evaluate each incoming edge, and release operands as their last
    // reachable consumer is finalized.
    let mut ready = vec![root.clone()];
    while let Some(consumer) = ready.pop() {
        let node = consumer.node().expect("reachable tensors are tracked");
        let Some(snapshot) = node.snapshot() else {
            continue;
        };
        let grad_out = consumer
            .grad()
            .expect("consumer gradient is finalized before its visit");

        for operand in distinct_operands(&snapshot) {
            let operand_node = operand.node().ok_or(Error::MissingNode)?;
            for (rule, edge_snapshot) in operand_node.edges_to(&consumer) {
                let ctx = BackwardContext::new(&edge_snapshot, &allocators.tensors);
                propagate_edge(&operand, rule, &ctx, &grad_out, &allocators.tensors)?;

                let entry = pending
                    .get_mut(&operand.key())
                    .expect("operand was discovered in the reachability pass");
                entry.1 -= 1;
                if entry.1 == 0 {
                    ready.push(operand.clone());
                }
            }
        }
    }

    Ok(())
}

/// Evaluate one edge: run the backward rule into zeroed scratch of the
/// operand's shape, then sum the scratch into the operand's gradient. The
/// scratch goes back to the pool on every exit path.
fn propagate_edge(
    operand: &Tensor,
    rule: BackwardFn,
    ctx: &BackwardContext<'_>,
    grad_out: &Tensor,
    pool: &TensorPool,
) -> Result<()> {
    let scratch = pool.alloc_no_grad_zero(&operand.shape())?;
    let result = rule(ctx, grad_out, &scratch).and_then(|()| accumulate(operand, &scratch, pool));
    pool.free_no_grad(&scratch);
    result
}

fn accumulate(operand: &Tensor, contribution: &Tensor, pool: &TensorPool) -> Result<()> {
    let grad = match operand.grad() {
        Some(grad) => grad,
        None => {
            let grad = pool.alloc_no_grad_zero(&operand.shape())?;
            operand.set_grad(grad.clone());
            grad
        }
    };
    grad.add_inplace(contribution)
}

fn seed_root(root: &Tensor, pool: &TensorPool) -> Result<()> {
    match root.grad() {
        Some(grad) => grad.fill(1.0),
        None => {
            let grad = pool.alloc_no_grad(&root.shape())?;
            grad.fill(1.0);
            root.set_grad(grad);
        }
    }
    Ok(())
}
