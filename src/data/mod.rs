//! Dataset loading and batch sampling

mod csv;
mod permutation;

pub use csv::CsvDataset;
pub use permutation::IndexPermutation;
