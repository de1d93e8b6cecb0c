//! CSV dataset ingestion
//!
//! Reads label-first CSV files (the MNIST-in-CSV layout: first column is
//! the class label, remaining columns are features). Rows are kept in a
//! flat row-major feature matrix plus a label column, and batches are
//! gathered into caller-allocated pool tensors.

use crate::autograd::Tensor;
use crate::{Error, Result};
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub struct CsvDataset {
    features: Vec<f64>,
    labels: Vec<f64>,
    rows: usize,
    feature_dim: usize,
}

impl CsvDataset {
    /// Load a dataset from disk. A leading non-numeric row is treated as a
    /// header and skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub(crate) fn parse(text: &str) -> Result<Self> {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        let mut feature_dim = None;
        let mut rows = 0;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut values = Vec::new();
            let mut numeric = true;
            for field in line.split(',') {
                match field.trim().parse::<f64>() {
                    Ok(v) => values.push(v),
                    Err(_) => {
                        numeric = false;
                        break;
                    }
                }
            }
            if !numeric {
                if rows == 0 && feature_dim.is_none() {
                    // Header row.
                    continue;
                }
                return Err(Error::Parse(format!("non-numeric field on line {}", line_no + 1)));
            }
            if values.len() < 2 {
                return Err(Error::Parse(format!(
                    "line {} has {} columns, need a label plus at least one feature",
                    line_no + 1,
                    values.len()
                )));
            }

            let dim = values.len() - 1;
            match feature_dim {
                None => feature_dim = Some(dim),
                Some(expected) if expected != dim => {
                    return Err(Error::Parse(format!(
                        "line {} has {dim} features, expected {expected}",
                        line_no + 1
                    )));
                }
                Some(_) => {}
            }

            labels.push(values[0]);
            features.extend_from_slice(&values[1..]);
            rows += 1;
        }

        let feature_dim = feature_dim.ok_or_else(|| Error::Parse("empty dataset".to_string()))?;
        Ok(Self { features, labels, rows, feature_dim })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn label(&self, row: usize) -> f64 {
        self.labels[row]
    }

    /// Standardize each feature column to zero mean and unit variance.
    /// Constant columns are left as-is.
    pub fn standard_scale(&mut self) {
        let rows = self.rows as f64;
        for col in 0..self.feature_dim {
            let mut mean = 0.0;
            for row in 0..self.rows {
                mean += self.features[row * self.feature_dim + col];
            }
            mean /= rows;

            let mut variance = 0.0;
            for row in 0..self.rows {
                let d = self.features[row * self.feature_dim + col] - mean;
                variance += d * d;
            }
            let std = (variance / rows).sqrt();
            if std < f64::EPSILON {
                continue;
            }

            for row in 0..self.rows {
                let v = &mut self.features[row * self.feature_dim + col];
                *v = (*v - mean) / std;
            }
        }
    }

    /// Gather the rows named by `indexes` into `x` (features) and `y`
    /// (labels). `x` must be `(indexes.len(), feature_dim)`, `y` must be
    /// `(indexes.len(), 1)`.
    pub fn sample_batch(&self, indexes: &[usize], x: &Tensor, y: &Tensor) -> Result<()> {
        let (x_rows, x_cols) = x.dims2()?;
        if x_rows != indexes.len() || x_cols != self.feature_dim {
            return Err(Error::ShapeMismatch {
                expected: vec![indexes.len(), self.feature_dim],
                got: vec![x_rows, x_cols],
            });
        }
        let (y_rows, y_cols) = y.dims2()?;
        if y_rows != indexes.len() || y_cols != 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![indexes.len(), 1],
                got: vec![y_rows, y_cols],
            });
        }

        let mut x_data = x.data_mut();
        let mut y_data = y.data_mut();
        for (batch_row, &row) in indexes.iter().enumerate() {
            if row >= self.rows {
                return Err(Error::IndexOutOfBounds {
                    row,
                    col: 0,
                    shape: vec![self.rows, self.feature_dim],
                });
            }
            let src = &self.features[row * self.feature_dim..(row + 1) * self.feature_dim];
            x_data[batch_row * self.feature_dim..(batch_row + 1) * self.feature_dim]
                .copy_from_slice(src);
            y_data[batch_row] = self.labels[row];
        }
        Ok(())
    }
}
