//! Experiment data preparation.
//!
//! - cleaning a raw table into inversion inputs (`preprocess`)
//! - synthetic experiments with known parameters (`synthetic`)

pub mod preprocess;
pub mod synthetic;

pub use preprocess::{PrepOptions, PreparedExperiment, prepare};
pub use synthetic::{SyntheticExperiment, SyntheticSpec, generate_experiment};
