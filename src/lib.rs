//! `dilation-inversion` library crate.
//!
//! Inverts the shear-dilation parameters of a rock fracture (dilation factor,
//! characteristic slip distance, dilation angle) from direct-shear test data.
//!
//! The binary (`dilfit`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the model and optimizer are reusable from other tools

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
