//! Shared domain types.
//!
//! The Unit Table is stored as two dense matrices (`X`: n×m inputs, `Y`: n×s
//! outputs) so the formulator can read columns and rows without reshaping.
//! Everything else here is a small value type passed between the loader, the
//! engine and the reporter.

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;

use crate::error::DeaError;

/// Default tolerance used for `is_efficient` and peer detection.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Which side of the DMU is scaled radially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Orientation {
    /// Contract inputs by θ while holding outputs (score = θ).
    Input,
    /// Expand outputs by φ while holding inputs (score = 1/φ).
    Output,
}

impl Orientation {
    pub fn display_name(self) -> &'static str {
        match self {
            Orientation::Input => "input-oriented",
            Orientation::Output => "output-oriented",
        }
    }
}

/// Returns-to-scale assumption for the envelopment model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReturnsToScale {
    /// Constant returns to scale (CCR).
    Crs,
    /// Variable returns to scale (BCC): adds the convexity row Σλ = 1.
    Vrs,
}

impl ReturnsToScale {
    pub fn display_name(self) -> &'static str {
        match self {
            ReturnsToScale::Crs => "CRS (CCR)",
            ReturnsToScale::Vrs => "VRS (BCC)",
        }
    }
}

/// Wire format of the record list read by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Json,
    Csv,
}

/// The immutable table of decision-making units scored in one run.
#[derive(Debug, Clone)]
pub struct UnitTable {
    ids: Vec<String>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    inputs: DMatrix<f64>,
    outputs: DMatrix<f64>,
}

impl UnitTable {
    /// Build a table from pre-assembled matrices.
    ///
    /// Only shape consistency is checked here; value checks belong to the
    /// engine's validation pass so they run for every table it scores.
    pub fn new(
        ids: Vec<String>,
        input_names: Vec<String>,
        output_names: Vec<String>,
        inputs: DMatrix<f64>,
        outputs: DMatrix<f64>,
    ) -> Result<Self, DeaError> {
        if inputs.nrows() != ids.len() || outputs.nrows() != ids.len() {
            return Err(DeaError::validation(format!(
                "ragged table: {} identifiers, {} input rows, {} output rows",
                ids.len(),
                inputs.nrows(),
                outputs.nrows()
            )));
        }
        if inputs.ncols() != input_names.len() {
            return Err(DeaError::validation(format!(
                "input matrix has {} columns but {} input names were given",
                inputs.ncols(),
                input_names.len()
            )));
        }
        if outputs.ncols() != output_names.len() {
            return Err(DeaError::validation(format!(
                "output matrix has {} columns but {} output names were given",
                outputs.ncols(),
                output_names.len()
            )));
        }

        Ok(Self {
            ids,
            input_names,
            output_names,
            inputs,
            outputs,
        })
    }

    /// Build a table from per-DMU rows, rejecting ragged rows.
    pub fn from_rows(
        ids: Vec<String>,
        input_names: Vec<String>,
        output_names: Vec<String>,
        input_rows: &[Vec<f64>],
        output_rows: &[Vec<f64>],
    ) -> Result<Self, DeaError> {
        let m = input_names.len();
        let s = output_names.len();

        if input_rows.len() != ids.len() || output_rows.len() != ids.len() {
            return Err(DeaError::validation(format!(
                "ragged table: {} identifiers, {} input rows, {} output rows",
                ids.len(),
                input_rows.len(),
                output_rows.len()
            )));
        }

        for (j, (x, y)) in input_rows.iter().zip(output_rows).enumerate() {
            if x.len() != m || y.len() != s {
                return Err(DeaError::validation(format!(
                    "row {} ({}): expected {m} inputs and {s} outputs, got {} and {}",
                    j + 1,
                    ids[j],
                    x.len(),
                    y.len()
                )));
            }
        }

        let inputs = DMatrix::from_fn(ids.len(), m, |j, i| input_rows[j][i]);
        let outputs = DMatrix::from_fn(ids.len(), s, |j, r| output_rows[j][r]);

        Self::new(ids, input_names, output_names, inputs, outputs)
    }

    /// Number of DMUs (n).
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of input columns (m).
    pub fn n_inputs(&self) -> usize {
        self.inputs.ncols()
    }

    /// Number of output columns (s).
    pub fn n_outputs(&self) -> usize {
        self.outputs.ncols()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, j: usize) -> &str {
        &self.ids[j]
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Input matrix `X` (n×m).
    pub fn inputs(&self) -> &DMatrix<f64> {
        &self.inputs
    }

    /// Output matrix `Y` (n×s).
    pub fn outputs(&self) -> &DMatrix<f64> {
        &self.outputs
    }
}

/// One member of a DMU's efficient reference set.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerWeight {
    pub index: usize,
    pub id: String,
    pub lambda: f64,
}

/// Successful per-DMU efficiency evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyResult {
    /// θ (input orientation) or 1/φ (output orientation), unclamped.
    pub score: f64,
    pub is_efficient: bool,
    /// Full λ vector, aligned to table order.
    pub lambdas: Vec<f64>,
    /// DMUs with λ above tolerance.
    pub peers: Vec<PeerWeight>,
    /// Input excess left after radial scaling, one per input column.
    pub input_slacks: Vec<f64>,
    /// Output shortfall left after radial scaling, one per output column.
    pub output_slacks: Vec<f64>,
}

/// What happened to one DMU.
#[derive(Debug, Clone, PartialEq)]
pub enum DmuOutcome {
    Scored(EfficiencyResult),
    /// The solver gave up on this DMU (unbounded, non-convergence, ...).
    Failed(String),
}

/// Outcome for one DMU, tagged with its identifier and table position.
#[derive(Debug, Clone, PartialEq)]
pub struct DmuResult {
    pub index: usize,
    pub id: String,
    pub outcome: DmuOutcome,
}

impl DmuResult {
    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            DmuOutcome::Scored(r) => Some(r.score),
            DmuOutcome::Failed(_) => None,
        }
    }

    pub fn is_efficient(&self) -> bool {
        matches!(&self.outcome, DmuOutcome::Scored(r) if r.is_efficient)
    }

    pub fn efficiency(&self) -> Option<&EfficiencyResult> {
        match &self.outcome {
            DmuOutcome::Scored(r) => Some(r),
            DmuOutcome::Failed(_) => None,
        }
    }
}

/// Aggregate result of scoring a Unit Table.
#[derive(Debug, Clone, PartialEq)]
pub struct DeaRun {
    /// One entry per DMU, in table order.
    pub results: Vec<DmuResult>,
    /// Identifiers of DMUs whose solve failed.
    pub failed: Vec<String>,
}

impl DeaRun {
    /// Scores aligned to table order (`None` for failed DMUs).
    pub fn scores(&self) -> Vec<Option<f64>> {
        self.results.iter().map(DmuResult::score).collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Knobs the engine needs for one run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub orientation: Orientation,
    pub returns_to_scale: ReturnsToScale,
    /// Tolerance for `is_efficient` and peer detection.
    pub tolerance: f64,
    /// Upper bound on concurrent solves; `None` uses available parallelism.
    pub workers: Option<usize>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Input,
            returns_to_scale: ReturnsToScale::Crs,
            tolerance: DEFAULT_TOLERANCE,
            workers: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, then environment, then defaults.
#[derive(Debug, Clone)]
pub struct DeaConfig {
    /// `None` reads standard input.
    pub input_path: Option<PathBuf>,
    pub format: InputFormat,

    pub id_column: String,
    pub input_columns: Vec<String>,
    pub output_columns: Vec<String>,

    pub engine: EngineOptions,

    pub top_n: usize,
    pub export_results: Option<PathBuf>,
}
