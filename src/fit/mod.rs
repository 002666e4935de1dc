//! Parameter inversion.
//!
//! Responsibilities:
//!
//! - RMSE objective over the analysis window (`objective`)
//! - bounded genetic-algorithm search (`ga`)
//! - orchestration of one inversion run (`fitter`)

pub mod fitter;
pub mod ga;
pub mod objective;

pub use fitter::*;
pub use ga::*;
pub use objective::*;
