//! Pooled allocators for tensors and graph nodes
//!
//! The two pools recycle slots through free lists instead of returning
//! storage to the heap: a freed tensor keeps its buffer capacity, a freed
//! node keeps its link-vector capacity. Allocation only reaches the heap
//! when the free list is empty or a recycled buffer is too small. Neither
//! pool is thread-safe; a pool and the tensors it produced form one
//! single-threaded resource bundle.

use crate::config::PoolSizing;
use crate::trace::{TraceStep, TRACER};
use crate::{Error, Result};
use std::cell::{Cell, RefCell};

use super::graph::{distinct_operands, GraphNode};
use super::tensor::Tensor;

/// Recycling allocator for tensor slots.
pub struct TensorPool {
    free: RefCell<Vec<Tensor>>,
    live: Cell<usize>,
    max_live: Option<usize>,
}

impl TensorPool {
    pub fn new() -> Self {
        Self::with_sizing(&PoolSizing::default())
    }

    pub fn with_sizing(sizing: &PoolSizing) -> Self {
        let free = (0..sizing.tensor_slots).map(|_| Tensor::new_slot()).collect();
        Self {
            free: RefCell::new(free),
            live: Cell::new(0),
            max_live: sizing.max_live_tensors,
        }
    }

    /// Allocate an untracked tensor. The buffer contents are unspecified.
    pub fn alloc_no_grad(&self, shape: &[usize]) -> Result<Tensor> {
        let _span = TRACER.span(TraceStep::Alloc);
        let tensor = self.grab_slot()?;
        tensor.prepare(shape).inspect_err(|_| self.put_back(&tensor))?;
        Ok(tensor)
    }

    /// Allocate an untracked tensor with a zeroed buffer.
    pub fn alloc_no_grad_zero(&self, shape: &[usize]) -> Result<Tensor> {
        let tensor = self.alloc_no_grad(shape)?;
        tensor.fill(0.0);
        Ok(tensor)
    }

    /// Return an untracked tensor's slot to the free list. A node still
    /// attached at this point is dropped rather than recycled.
    pub fn free_no_grad(&self, tensor: &Tensor) {
        tensor.take_node();
        if let Some(grad) = tensor.take_grad() {
            self.put_back(&grad);
        }
        self.put_back(tensor);
    }

    /// Tensors currently checked out.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Slots waiting on the free list.
    pub fn recycled(&self) -> usize {
        self.free.borrow().len()
    }

    fn grab_slot(&self) -> Result<Tensor> {
        if let Some(max) = self.max_live {
            if self.live.get() >= max {
                return Err(Error::OutOfMemory);
            }
        }
        // A recycled slot is only reused once every outside handle to it has
        // been dropped; stale handles keep their slot out of circulation.
        let slot = loop {
            match self.free.borrow_mut().pop() {
                Some(candidate) if candidate.is_unique() => break candidate,
                Some(_stale) => continue,
                None => break Tensor::new_slot(),
            }
        };
        self.live.set(self.live.get() + 1);
        Ok(slot)
    }

    pub(crate) fn put_back(&self, tensor: &Tensor) {
        self.live.set(self.live.get().saturating_sub(1));
        self.free.borrow_mut().push(tensor.clone());
    }
}

impl Default for TensorPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Recycling allocator for graph nodes and their link storage.
pub struct GraphPool {
    free: RefCell<Vec<GraphNode>>,
    link_capacity: usize,
}

impl GraphPool {
    pub fn new() -> Self {
        Self::with_sizing(&PoolSizing::default())
    }

    pub fn with_sizing(sizing: &PoolSizing) -> Self {
        let free = (0..sizing.node_slots)
            .map(|_| GraphNode::with_link_capacity(sizing.link_capacity))
            .collect();
        Self {
            free: RefCell::new(free),
            link_capacity: sizing.link_capacity,
        }
    }

    /// Allocate an empty node.
    pub fn alloc_node(&self) -> GraphNode {
        self.free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| GraphNode::with_link_capacity(self.link_capacity))
    }

    /// Clear a node and return it to the free list. Its links (and the
    /// snapshot they share) are dropped; the link storage is recycled with
    /// the node.
    pub fn free_node(&self, node: GraphNode) {
        node.clear();
        self.free.borrow_mut().push(node);
    }

    pub fn recycled(&self) -> usize {
        self.free.borrow().len()
    }
}

impl Default for GraphPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The allocator pair threaded through forward registration and backward.
pub struct AutogradAllocators {
    pub tensors: TensorPool,
    pub graph: GraphPool,
}

impl AutogradAllocators {
    pub fn new() -> Self {
        Self::with_sizing(&PoolSizing::default())
    }

    pub fn with_sizing(sizing: &PoolSizing) -> Self {
        Self {
            tensors: TensorPool::with_sizing(sizing),
            graph: GraphPool::with_sizing(sizing),
        }
    }

    /// Allocate a gradient-tracked tensor: a node is attached up front so
    /// the tensor can appear as an operand; its gradient is created lazily
    /// on first accumulation.
    pub fn alloc(&self, shape: &[usize]) -> Result<Tensor> {
        let tensor = self.tensors.alloc_no_grad(shape)?;
        tensor.set_node(self.graph.alloc_node());
        Ok(tensor)
    }

    /// Release a tracked tensor: detach and recycle its node (dropping its
    /// links and snapshot), unhook the operand-side links that point at it,
    /// release its gradient, and recycle the slot.
    pub fn free(&self, tensor: &Tensor) {
        if let Some(node) = tensor.take_node() {
            if let Some(snapshot) = node.snapshot() {
                for operand in distinct_operands(&snapshot) {
                    if let Some(operand_node) = operand.node() {
                        operand_node.remove_links_to(tensor);
                    }
                }
            }
            self.graph.free_node(node);
        }
        self.tensors.free_no_grad(tensor);
    }
}

impl Default for AutogradAllocators {
    fn default() -> Self {
        Self::new()
    }
}
