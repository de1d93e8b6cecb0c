//! Pooled tensor handle with optional gradient tracking
//!
//! A [`Tensor`] is a cheap shared handle to a slot owned by the tensor pool.
//! The slot keeps a row-major `f64` buffer whose capacity is cached across
//! recycling, the logical shape, and optionally a computational-graph node
//! and a gradient tensor of identical shape. Graph identity is handle
//! identity: the engine compares tensors with [`Tensor::ptr_eq`], never by
//! value.

use crate::config::MAX_RANK;
use crate::{Error, Result};
use ndarray::Array1;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use super::graph::GraphNode;

pub(crate) struct TensorData {
    /// Backing buffer; may be larger than the logical element count.
    buf: Array1<f64>,
    /// Logical element count, the product of `shape`.
    len: usize,
    shape: Vec<usize>,
    node: Option<GraphNode>,
    grad: Option<Tensor>,
}

/// Shared handle to a pooled tensor slot.
#[derive(Clone)]
pub struct Tensor {
    inner: Rc<RefCell<TensorData>>,
}

impl Tensor {
    /// An empty slot, as held on a pool free list.
    pub(crate) fn new_slot() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TensorData {
                buf: Array1::zeros(0),
                len: 0,
                shape: Vec::new(),
                node: None,
                grad: None,
            })),
        }
    }

    /// Re-shape a recycled slot for a fresh allocation.
    ///
    /// Grows the buffer by reallocation only when the new element count
    /// exceeds the cached capacity; stale values are left in place.
    pub(crate) fn prepare(&self, shape: &[usize]) -> Result<()> {
        if shape.is_empty() || shape.len() > MAX_RANK {
            return Err(Error::WrongShape(format!(
                "rank {} outside 1..={MAX_RANK}",
                shape.len()
            )));
        }
        if shape.contains(&0) {
            return Err(Error::WrongShape(format!("zero-sized dimension in {shape:?}")));
        }
        let len: usize = shape.iter().product();

        let mut data = self.inner.borrow_mut();
        if data.buf.len() < len {
            data.buf = Array1::zeros(len);
        }
        data.len = len;
        data.shape.clear();
        data.shape.extend_from_slice(shape);
        Ok(())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.borrow().shape.clone()
    }

    pub fn rank(&self) -> usize {
        self.inner.borrow().shape.len()
    }

    /// Logical element count.
    pub fn len(&self) -> usize {
        self.inner.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows and columns of a rank-2 tensor.
    pub fn dims2(&self) -> Result<(usize, usize)> {
        let data = self.inner.borrow();
        if data.shape.len() != 2 {
            return Err(Error::WrongShape(format!(
                "expected rank 2, got shape {:?}",
                data.shape
            )));
        }
        Ok((data.shape[0], data.shape[1]))
    }

    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.inner.borrow().shape == other.inner.borrow().shape
    }

    /// Borrow the logical elements.
    pub fn data(&self) -> Ref<'_, [f64]> {
        Ref::map(self.inner.borrow(), |d| {
            &d.buf.as_slice().expect("tensor buffer is contiguous")[..d.len]
        })
    }

    /// Mutably borrow the logical elements.
    pub fn data_mut(&self) -> RefMut<'_, [f64]> {
        RefMut::map(self.inner.borrow_mut(), |d| {
            let len = d.len;
            &mut d.buf.as_slice_mut().expect("tensor buffer is contiguous")[..len]
        })
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data().to_vec()
    }

    pub fn fill(&self, value: f64) {
        for x in self.data_mut().iter_mut() {
            *x = value;
        }
    }

    /// Read element `(row, col)` of a rank-2 tensor with bounds checking.
    pub fn get2(&self, row: usize, col: usize) -> Result<f64> {
        let (rows, cols) = self.dims2()?;
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, shape: self.shape() });
        }
        Ok(self.data()[row * cols + col])
    }

    /// Write element `(row, col)` of a rank-2 tensor with bounds checking.
    pub fn set2(&self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.dims2()?;
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, shape: self.shape() });
        }
        self.data_mut()[row * cols + col] = value;
        Ok(())
    }

    /// Copy `src`'s elements into `self`. Shapes must match exactly.
    pub fn copy_from(&self, src: &Tensor) -> Result<()> {
        if self.ptr_eq(src) {
            return Ok(());
        }
        if !self.same_shape(src) {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                got: src.shape(),
            });
        }
        self.data_mut().copy_from_slice(&src.data());
        Ok(())
    }

    /// Element-wise `self += other`. Shapes must match exactly.
    pub fn add_inplace(&self, other: &Tensor) -> Result<()> {
        if self.ptr_eq(other) {
            for x in self.data_mut().iter_mut() {
                *x += *x;
            }
            return Ok(());
        }
        if !self.same_shape(other) {
            return Err(Error::ShapeMismatch {
                expected: self.shape(),
                got: other.shape(),
            });
        }
        let rhs = other.data();
        for (x, y) in self.data_mut().iter_mut().zip(rhs.iter()) {
            *x += *y;
        }
        Ok(())
    }

    /// Whether the tensor participates in the computational graph.
    pub fn is_tracked(&self) -> bool {
        self.inner.borrow().node.is_some()
    }

    pub(crate) fn node(&self) -> Option<GraphNode> {
        self.inner.borrow().node.clone()
    }

    pub(crate) fn set_node(&self, node: GraphNode) {
        self.inner.borrow_mut().node = Some(node);
    }

    pub(crate) fn take_node(&self) -> Option<GraphNode> {
        self.inner.borrow_mut().node.take()
    }

    /// The gradient accumulator, if one has been attached.
    pub fn grad(&self) -> Option<Tensor> {
        self.inner.borrow().grad.clone()
    }

    pub(crate) fn set_grad(&self, grad: Tensor) {
        self.inner.borrow_mut().grad = Some(grad);
    }

    pub(crate) fn take_grad(&self) -> Option<Tensor> {
        self.inner.borrow_mut().grad.take()
    }

    /// Zero the gradient accumulator in place, keeping its allocation.
    pub fn zero_grad(&self) {
        if let Some(grad) = self.grad() {
            grad.fill(0.0);
        }
    }

    /// Handle identity; the graph never compares tensors by value.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn is_unique(&self) -> bool {
        Rc::strong_count(&self.inner) == 1
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Tensor")
            .field("shape", &data.shape)
            .field("tracked", &data.node.is_some())
            .field("has_grad", &data.grad.is_some())
            .finish()
    }
}
