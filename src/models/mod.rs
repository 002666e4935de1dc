//! Physical model of fracture aperture under shear.
//!
//! Implemented as small, pure functions so that the objective and search code
//! can stay generic.

pub mod aperture;

pub use aperture::*;
