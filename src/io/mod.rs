//! Model saving and loading

mod model;

pub use model::{load_model, save_model, ModelState, TensorState};
