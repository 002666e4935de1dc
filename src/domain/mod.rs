//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the inverted parameter vector and its bounds (`DilationParams`, `ParamBounds`)
//! - raw and prepared experiment data (`ShearTestTable`, `InversionInputs`)
//! - fit outputs and run configuration (`FitResult`, `GaConfig`, `FitConfig`)

pub mod types;

pub use types::*;
