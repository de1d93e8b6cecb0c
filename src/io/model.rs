//! Model persistence
//!
//! Named parameter tensors serialize to JSON and restore either into fresh
//! pool tensors or into an already-constructed model's parameters.

use crate::autograd::{AutogradAllocators, Tensor};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorState {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    pub name: String,
    pub params: Vec<TensorState>,
}

impl ModelState {
    /// Snapshot named parameters into a serializable state.
    pub fn capture(name: impl Into<String>, params: &[(&str, &Tensor)]) -> Self {
        Self {
            name: name.into(),
            params: params
                .iter()
                .map(|(param_name, tensor)| TensorState {
                    name: (*param_name).to_string(),
                    shape: tensor.shape(),
                    data: tensor.to_vec(),
                })
                .collect(),
        }
    }

    /// Materialize every stored parameter as a fresh tracked pool tensor.
    pub fn restore(&self, allocators: &AutogradAllocators) -> Result<Vec<(String, Tensor)>> {
        let mut out = Vec::with_capacity(self.params.len());
        for state in &self.params {
            let expected: usize = state.shape.iter().product();
            if expected != state.data.len() {
                return Err(Error::DataSizeMismatch {
                    expected,
                    got: state.data.len(),
                });
            }
            let tensor = allocators.alloc(&state.shape)?;
            tensor.data_mut().copy_from_slice(&state.data);
            out.push((state.name.clone(), tensor));
        }
        Ok(out)
    }

    /// Copy stored values into existing parameters, matched by name.
    pub fn apply_to(&self, params: &[(&str, &Tensor)]) -> Result<()> {
        for (name, tensor) in params {
            let state = self
                .params
                .iter()
                .find(|s| s.name == *name)
                .ok_or_else(|| Error::Serialization(format!("missing parameter {name:?}")))?;
            if state.shape != tensor.shape() {
                return Err(Error::ShapeMismatch {
                    expected: tensor.shape(),
                    got: state.shape.clone(),
                });
            }
            tensor.data_mut().copy_from_slice(&state.data);
        }
        Ok(())
    }
}

/// Serialize a model state to pretty-printed JSON on disk.
pub fn save_model(state: &ModelState, path: impl AsRef<Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(state)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
    fs::write(path, text)?;
    Ok(())
}

/// Load a model state from a JSON file.
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelState> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Serialization(format!("JSON deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::AutogradAllocators;

    #[test]
    fn save_load_round_trip() {
        let allocators = AutogradAllocators::new();
        let weights = allocators.alloc(&[2, 2]).expect("alloc");
        weights.data_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let state = ModelState::capture("mlp", &[("weights", &weights)]);
        let file = tempfile::NamedTempFile::new().expect("temp file");
        save_model(&state, file.path()).expect("save");

        let loaded = load_model(file.path()).expect("load");
        assert_eq!(loaded.name, "mlp");
        let restored = loaded.restore(&allocators).expect("restore");
        assert_eq!(restored[0].0, "weights");
        assert_eq!(restored[0].1.shape(), vec![2, 2]);
        assert_eq!(&*restored[0].1.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(restored[0].1.is_tracked());
    }

    #[test]
    fn apply_to_checks_shape() {
        let allocators = AutogradAllocators::new();
        let source = allocators.alloc(&[1, 2]).expect("alloc");
        source.data_mut().copy_from_slice(&[5.0, 6.0]);
        let state = ModelState::capture("m", &[("w", &source)]);

        let wrong = allocators.alloc(&[2, 2]).expect("alloc");
        assert!(matches!(
            state.apply_to(&[("w", &wrong)]),
            Err(Error::ShapeMismatch { .. })
        ));

        let right = allocators.alloc(&[1, 2]).expect("alloc");
        state.apply_to(&[("w", &right)]).expect("apply");
        assert_eq!(&*right.data(), &[5.0, 6.0]);
    }

    #[test]
    fn apply_to_reports_missing_parameter() {
        let allocators = AutogradAllocators::new();
        let t = allocators.alloc(&[1, 1]).expect("alloc");
        let state = ModelState::capture("m", &[]);
        assert!(matches!(
            state.apply_to(&[("w", &t)]),
            Err(Error::Serialization(_))
        ));
    }
}
