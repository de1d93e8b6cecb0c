//! # Derivar: pooled reverse-mode autograd
//!
//! Derivar is a small neural-network training library built around dense
//! row-major `f64` tensors. Forward kernels run eagerly and record their
//! operand links into an implicit computational graph; a reverse-topological
//! traversal then accumulates partial derivatives of a scalar loss into
//! every participating tensor. Tensors, graph nodes, and backward scratch
//! all come from recycling pools, so a training step allocates from the
//! heap only while the pools warm up.
//!
//! ## Architecture
//!
//! - **autograd**: pools, graph links, the backward engine, and the
//!   differentiable operations
//! - **nn**: the fully-connected layer
//! - **train**: loss functions and the trainable-parameter registry
//! - **optim**: SGD with momentum
//! - **data**: CSV ingestion and shuffled index sampling
//! - **io**: JSON model persistence
//! - **trace**: opt-in timing instrumentation
//!
//! ## Example
//!
//! ```
//! use derivar::autograd::ops::{relu_graph, sum_graph};
//! use derivar::{backward, AutogradAllocators};
//!
//! let allocators = AutogradAllocators::new();
//! let x = allocators.alloc(&[1, 4])?;
//! x.data_mut().copy_from_slice(&[-1.0, 2.0, -3.0, 4.0]);
//!
//! let y = allocators.alloc(&[1, 4])?;
//! relu_graph(&x, &y, &allocators)?;
//! let loss = allocators.alloc(&[1, 1])?;
//! sum_graph(&y, &loss, &allocators)?;
//!
//! backward(&loss, &allocators)?;
//! assert_eq!(&*x.grad().unwrap().data(), &[0.0, 1.0, 0.0, 1.0]);
//! # Ok::<(), derivar::Error>(())
//! ```

pub mod autograd;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod nn;
pub mod optim;
pub mod trace;
pub mod train;

// Re-export commonly used types
pub use autograd::{add_link, backward, zero_grad, AutogradAllocators, Tensor};
pub use config::{PoolSizing, MAX_OPERANDS, MAX_RANK};
pub use error::{Error, Result};
