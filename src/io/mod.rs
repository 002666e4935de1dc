//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - CSV exports (`export`)
//! - result JSON read/write (`result_file`)

pub mod export;
pub mod ingest;
pub mod result_file;

pub use export::*;
pub use ingest::*;
pub use result_file::*;
