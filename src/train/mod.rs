//! Training-side building blocks: losses and the parameter registry

mod loss;
mod params;

pub use loss::{
    cross_entropy_loss, cross_entropy_loss_graph, mse_loss, mse_loss_graph, CrossEntropyOperand,
    MseOperand,
};
pub use params::ModelParams;
