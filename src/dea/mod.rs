//! Data Envelopment Analysis.
//!
//! Responsibilities:
//!
//! - validate a Unit Table before any solve (`validate`)
//! - build the envelopment LP for one DMU (`formulate`)
//! - solve it through a pluggable LP backend (`solver`)
//! - score every DMU in parallel and collect outcomes (`engine`)

pub mod engine;
pub mod formulate;
pub mod solver;
pub mod validate;

pub use engine::*;
pub use formulate::*;
pub use solver::*;
pub use validate::*;
