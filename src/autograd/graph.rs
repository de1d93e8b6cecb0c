//! Computational-graph nodes and links
//!
//! Forward kernels register one link per operand after they run: the link
//! hangs off the operand's node, names the slot the operand occupies in the
//! consumer's operation, and carries the backward rule for that slot. All
//! links into one consumer share a single operand snapshot, the fixed-width
//! tuple the backward rules receive as their context.

use crate::config::MAX_OPERANDS;
use crate::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

use super::context::BackwardFn;
use super::pool::AutogradAllocators;
use super::tensor::Tensor;

/// The operand tuple shared by every link into one consumer.
pub(crate) type Snapshot = Rc<RefCell<[Option<Tensor>; MAX_OPERANDS]>>;

/// An edge from an operand to the tensor produced from it.
pub(crate) struct Link {
    pub(crate) consumer: Tensor,
    #[allow(dead_code)]
    pub(crate) operand_index: usize,
    pub(crate) backward: BackwardFn,
    pub(crate) snapshot: Snapshot,
}

pub(crate) struct NodeData {
    /// Outgoing links, in registration order.
    pub(crate) links: Vec<Link>,
    /// Operand snapshot of the operation that produced this tensor, if any.
    pub(crate) snapshot: Option<Snapshot>,
}

/// Per-tensor record in the computational graph.
#[derive(Clone)]
pub struct GraphNode {
    inner: Rc<RefCell<NodeData>>,
}

impl GraphNode {
    pub(crate) fn with_link_capacity(capacity: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeData {
                links: Vec::with_capacity(capacity),
                snapshot: None,
            })),
        }
    }

    /// Drop links and snapshot, keeping the link storage for reuse.
    pub(crate) fn clear(&self) {
        let mut data = self.inner.borrow_mut();
        data.links.clear();
        data.snapshot = None;
    }

    pub(crate) fn push_link(&self, link: Link) {
        self.inner.borrow_mut().links.push(link);
    }

    pub(crate) fn snapshot(&self) -> Option<Snapshot> {
        self.inner.borrow().snapshot.clone()
    }

    /// The consumer snapshot, created on the first incoming link.
    pub(crate) fn snapshot_or_create(&self) -> Snapshot {
        let mut data = self.inner.borrow_mut();
        data.snapshot
            .get_or_insert_with(|| Rc::new(RefCell::new(std::array::from_fn(|_| None))))
            .clone()
    }

    /// Number of outgoing links targeting `consumer`.
    pub(crate) fn links_to(&self, consumer: &Tensor) -> usize {
        self.inner
            .borrow()
            .links
            .iter()
            .filter(|l| l.consumer.ptr_eq(consumer))
            .count()
    }

    /// Drop the outgoing links targeting `consumer`.
    pub(crate) fn remove_links_to(&self, consumer: &Tensor) {
        self.inner.borrow_mut().links.retain(|l| !l.consumer.ptr_eq(consumer));
    }

    /// Backward rules and their context snapshots for the outgoing links
    /// targeting `consumer`.
    pub(crate) fn edges_to(&self, consumer: &Tensor) -> Vec<(BackwardFn, Snapshot)> {
        self.inner
            .borrow()
            .links
            .iter()
            .filter(|l| l.consumer.ptr_eq(consumer))
            .map(|l| (l.backward, l.snapshot.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn link_count(&self) -> usize {
        self.inner.borrow().links.len()
    }

    #[cfg(test)]
    pub(crate) fn link_at(&self, index: usize) -> Option<(Tensor, usize, Snapshot)> {
        self.inner
            .borrow()
            .links
            .get(index)
            .map(|l| (l.consumer.clone(), l.operand_index, l.snapshot.clone()))
    }
}

/// Distinct tensors of a snapshot, in slot order.
pub(crate) fn distinct_operands(snapshot: &Snapshot) -> Vec<Tensor> {
    let slots = snapshot.borrow();
    let mut out: Vec<Tensor> = Vec::new();
    for slot in slots.iter().flatten() {
        if !out.iter().any(|t| t.ptr_eq(slot)) {
            out.push(slot.clone());
        }
    }
    out
}

/// Record that `consumer` was produced from `operand` in slot
/// `operand_index`, with `backward` as the gradient rule for that slot.
///
/// The operand must already be gradient-tracked; the consumer becomes
/// tracked on its first link. Repeated registration of the same operand
/// slot overwrites the snapshot entry and appends another link.
pub fn add_link(
    operand: &Tensor,
    operand_index: usize,
    consumer: &Tensor,
    backward: BackwardFn,
    allocators: &AutogradAllocators,
) -> Result<()> {
    if operand_index >= MAX_OPERANDS {
        return Err(Error::IndexOutOfBounds {
            row: operand_index,
            col: 0,
            shape: vec![MAX_OPERANDS],
        });
    }
    let operand_node = operand.node().ok_or(Error::MissingNode)?;

    let consumer_node = match consumer.node() {
        Some(node) => node,
        None => {
            let node = allocators.graph.alloc_node();
            consumer.set_node(node.clone());
            node
        }
    };

    let snapshot = consumer_node.snapshot_or_create();
    snapshot.borrow_mut()[operand_index] = Some(operand.clone());

    operand_node.push_link(Link {
        consumer: consumer.clone(),
        operand_index,
        backward,
        snapshot,
    });
    Ok(())
}
