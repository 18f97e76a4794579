//! `dea-rank` library crate.
//!
//! The binary (`dea`) is a thin wrapper around this library so that:
//!
//! - the engine is testable without spawning processes
//! - the LP backend can be swapped behind the `LpSolver` trait
//! - ingest, scoring and presentation stay in separate modules

pub mod app;
pub mod cli;
pub mod dea;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
