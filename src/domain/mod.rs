//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - model configuration enums (`Orientation`, `ReturnsToScale`, `InputFormat`)
//! - the immutable `UnitTable` of DMUs
//! - per-DMU outcomes (`EfficiencyResult`, `DmuOutcome`) and the run aggregate

pub mod types;

pub use types::*;
