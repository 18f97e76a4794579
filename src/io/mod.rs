//! Input/output helpers.
//!
//! - JSON/CSV record ingest into a Unit Table (`ingest`)
//! - JSON wire payload and CSV export (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
