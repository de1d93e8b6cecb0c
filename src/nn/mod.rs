//! Neural-network layers

mod linear;

pub use linear::{Linear, LinearOperand};
