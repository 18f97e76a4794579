//! DEA orchestration: one LP per DMU, fanned out over a bounded worker pool.
//!
//! For each DMU `k` the engine:
//!
//! 1. builds the envelopment LP (`formulate`)
//! 2. hands it to the configured [`LpSolver`]
//! 3. turns the solver outcome into a [`DmuOutcome`]
//!
//! Solves are independent, so they run on a dedicated rayon pool sized
//! `min(n, workers)`. Results are collected by index, which keeps the output
//! aligned to table order regardless of scheduling.
//!
//! Failure policy:
//! - infeasible → fatal for the run (`DeaError::ModelInfeasible`); tasks that
//!   have not started yet are skipped
//! - unbounded / numerical trouble → recorded for that DMU, run continues

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::dea::formulate::{LinearProgram, RADIAL_VAR, formulate};
use crate::dea::solver::{LpSolver, SolveOutcome};
use crate::dea::validate::validate_table;
use crate::domain::{
    DeaRun, DmuOutcome, DmuResult, EfficiencyResult, EngineOptions, Orientation, PeerWeight, UnitTable,
};
use crate::error::DeaError;

/// Maximum scaled constraint violation accepted from an "optimal" solution.
const FEASIBILITY_TOL: f64 = 1e-6;

/// Per-slot result before aggregation.
#[derive(Debug)]
enum Slot {
    Done(DmuOutcome),
    Infeasible,
    /// Not solved because another DMU already aborted the run.
    Skipped,
}

/// Scores every DMU of a Unit Table against the frontier of all DMUs.
#[derive(Debug, Clone)]
pub struct DeaEngine<S> {
    solver: S,
    options: EngineOptions,
}

impl<S: LpSolver> DeaEngine<S> {
    pub fn new(solver: S, options: EngineOptions) -> Self {
        Self { solver, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Score every DMU in `table`.
    pub fn evaluate(&self, table: &UnitTable) -> Result<DeaRun, DeaError> {
        if !(self.options.tolerance.is_finite() && self.options.tolerance > 0.0) {
            return Err(DeaError::validation(format!(
                "tolerance must be finite and > 0, got {}",
                self.options.tolerance
            )));
        }
        validate_table(table)?;

        let n = table.len();
        let workers = self
            .options
            .workers
            .unwrap_or_else(default_workers)
            .clamp(1, n);

        info!(
            dmus = n,
            inputs = table.n_inputs(),
            outputs = table.n_outputs(),
            workers,
            solver = self.solver.name(),
            orientation = self.options.orientation.display_name(),
            rts = self.options.returns_to_scale.display_name(),
            "scoring DMUs"
        );

        let cancelled = AtomicBool::new(false);
        let slots: Vec<Slot> = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| {
                (0..n)
                    .into_par_iter()
                    .map(|k| self.solve_slot(table, k, &cancelled))
                    .collect()
            }),
            Err(e) => {
                warn!(error = %e, "could not build worker pool; solving sequentially");
                (0..n).map(|k| self.solve_slot(table, k, &cancelled)).collect()
            }
        };

        self.aggregate(table, slots)
    }

    fn solve_slot(&self, table: &UnitTable, k: usize, cancelled: &AtomicBool) -> Slot {
        if cancelled.load(Ordering::Acquire) {
            return Slot::Skipped;
        }

        let lp = match formulate(table, k, self.options.orientation, self.options.returns_to_scale) {
            Ok(lp) => lp,
            Err(e) => return Slot::Done(DmuOutcome::Failed(e.to_string())),
        };

        match self.solver.solve(&lp) {
            SolveOutcome::Optimal { values, .. } => Slot::Done(self.interpret(table, &lp, &values)),
            SolveOutcome::Infeasible => {
                cancelled.store(true, Ordering::Release);
                Slot::Infeasible
            }
            SolveOutcome::Unbounded => Slot::Done(DmuOutcome::Failed("solver reported unbounded".to_string())),
            SolveOutcome::NumericalFailure(detail) => Slot::Done(DmuOutcome::Failed(detail)),
        }
    }

    /// Turn an optimal assignment into an efficiency result.
    fn interpret(&self, table: &UnitTable, lp: &LinearProgram, values: &[f64]) -> DmuOutcome {
        let k = lp.target;
        let n = table.len();
        let tol = self.options.tolerance;

        if values.len() != 1 + n {
            return DmuOutcome::Failed(format!(
                "solver returned {} values for {} variables",
                values.len(),
                1 + n
            ));
        }

        let radial = values[RADIAL_VAR];
        if !(radial.is_finite() && radial > 0.0) {
            return DmuOutcome::Failed(format!("invalid radial factor {radial}"));
        }

        let violation = lp.max_relative_violation(values);
        if violation > FEASIBILITY_TOL {
            return DmuOutcome::Failed(format!(
                "solution violates constraints (scaled violation {violation:.3e})"
            ));
        }

        let score = match self.options.orientation {
            Orientation::Input => radial,
            Orientation::Output => 1.0 / radial,
        };

        let lambdas = values[1..].to_vec();
        let lambda = DVector::from_column_slice(&lambdas);
        let composite_x = table.inputs().transpose() * &lambda;
        let composite_y = table.outputs().transpose() * &lambda;
        let own_x = table.inputs().row(k).transpose();
        let own_y = table.outputs().row(k).transpose();

        let (input_slacks, output_slacks): (Vec<f64>, Vec<f64>) = match self.options.orientation {
            Orientation::Input => (
                (own_x * radial - composite_x).iter().map(|&v| snap(v, tol)).collect(),
                (composite_y - own_y).iter().map(|&v| snap(v, tol)).collect(),
            ),
            Orientation::Output => (
                (own_x - composite_x).iter().map(|&v| snap(v, tol)).collect(),
                (composite_y - own_y * radial).iter().map(|&v| snap(v, tol)).collect(),
            ),
        };

        let peers = lambdas
            .iter()
            .enumerate()
            .filter(|(_, l)| **l > tol)
            .map(|(j, &l)| PeerWeight {
                index: j,
                id: table.id(j).to_string(),
                lambda: l,
            })
            .collect();

        debug!(dmu = table.id(k), score, "scored DMU");

        DmuOutcome::Scored(EfficiencyResult {
            score,
            is_efficient: (score - 1.0).abs() <= tol,
            lambdas,
            peers,
            input_slacks,
            output_slacks,
        })
    }

    fn aggregate(&self, table: &UnitTable, slots: Vec<Slot>) -> Result<DeaRun, DeaError> {
        if let Some(k) = slots.iter().position(|s| matches!(s, Slot::Infeasible)) {
            let completed = slots.iter().filter(|s| matches!(s, Slot::Done(_))).count();
            let skipped = slots.iter().filter(|s| matches!(s, Slot::Skipped)).count();
            warn!(
                dmu = table.id(k),
                completed, skipped, "infeasible envelopment program; aborting run"
            );
            return Err(DeaError::ModelInfeasible {
                dmu: table.id(k).to_string(),
                detail: "solver reported infeasible although the DMU can reference itself".to_string(),
            });
        }

        let mut results = Vec::with_capacity(slots.len());
        let mut failed = Vec::new();

        for (k, slot) in slots.into_iter().enumerate() {
            let outcome = match slot {
                Slot::Done(outcome) => outcome,
                // Only reachable when an infeasible slot exists, handled above.
                Slot::Infeasible | Slot::Skipped => DmuOutcome::Failed("not solved".to_string()),
            };
            if let DmuOutcome::Failed(reason) = &outcome {
                let err = DeaError::SolverFailure {
                    dmu: table.id(k).to_string(),
                    detail: reason.clone(),
                };
                warn!("{err}");
                failed.push(table.id(k).to_string());
            }
            results.push(DmuResult {
                index: k,
                id: table.id(k).to_string(),
                outcome,
            });
        }

        let efficient = results.iter().filter(|r| r.is_efficient()).count();
        info!(efficient, failed = failed.len(), "scoring finished");

        Ok(DeaRun { results, failed })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Zero out solver noise around the boundary.
fn snap(value: f64, tol: f64) -> f64 {
    if value.abs() <= tol { 0.0 } else { value }
}
