//! LP solver capability and the production adapter.
//!
//! The engine only sees [`LpSolver`]: hand it a [`LinearProgram`], get back a
//! [`SolveOutcome`]. Any backend that honours this contract is interchangeable.
//! The default adapter drives `good_lp` with its pure-Rust `microlp` simplex.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use good_lp::solvers::microlp::microlp;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint, variable,
};

use crate::dea::formulate::{ConstraintSense, LinearProgram, ObjectiveSense};

/// Result of one LP solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// Optimal assignment, in the program's variable order.
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    /// Non-convergence or any other solver-internal trouble.
    NumericalFailure(String),
}

/// A general-purpose LP solver.
pub trait LpSolver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn solve(&self, lp: &LinearProgram) -> SolveOutcome;
}

/// `good_lp` + `microlp` backend.
///
/// A backend panic becomes a `NumericalFailure` for that program only. The
/// process panic hook still runs, so the raw panic line also reaches stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpSolver;

impl LpSolver for MicroLpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, lp: &LinearProgram) -> SolveOutcome {
        // The backend panics on a few degenerate inputs; keep that local to the DMU.
        match catch_unwind(AssertUnwindSafe(|| solve_with_microlp(lp))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                SolveOutcome::NumericalFailure(format!("solver panicked: {}", panic_message(&*payload)))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

fn solve_with_microlp(lp: &LinearProgram) -> SolveOutcome {
    if lp.bounds.len() != lp.n_vars() || lp.constraints.ncols() != lp.n_vars() {
        return SolveOutcome::NumericalFailure("malformed program: variable count mismatch".to_string());
    }

    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = lp
        .bounds
        .iter()
        .map(|b| {
            let mut def = variable();
            if let Some(lo) = b.lower {
                def = def.min(lo);
            }
            if let Some(hi) = b.upper {
                def = def.max(hi);
            }
            vars.add(def)
        })
        .collect();

    let objective = linear_expression(lp.objective.iter().copied(), &handles);
    let unsolved = match lp.sense {
        ObjectiveSense::Minimize => vars.minimise(objective),
        ObjectiveSense::Maximize => vars.maximise(objective),
    };

    let mut model = unsolved.using(microlp);
    for (row, sense) in lp.row_senses.iter().enumerate() {
        let lhs = linear_expression(lp.constraints.row(row).iter().copied(), &handles);
        model = model.with(row_constraint(lhs, *sense, lp.rhs[row]));
    }

    match model.solve() {
        Ok(solution) => {
            let values: Vec<f64> = handles.iter().map(|v| solution.value(*v)).collect();
            let objective = lp.objective.iter().zip(&values).map(|(c, v)| c * v).sum();
            SolveOutcome::Optimal { values, objective }
        }
        Err(ResolutionError::Infeasible) => SolveOutcome::Infeasible,
        Err(ResolutionError::Unbounded) => SolveOutcome::Unbounded,
        Err(other) => SolveOutcome::NumericalFailure(other.to_string()),
    }
}

fn linear_expression(coefficients: impl Iterator<Item = f64>, handles: &[Variable]) -> Expression {
    let mut expr = Expression::from(0.0);
    for (coef, var) in coefficients.zip(handles) {
        if coef != 0.0 {
            expr += coef * *var;
        }
    }
    expr
}

fn row_constraint(lhs: Expression, sense: ConstraintSense, rhs: f64) -> Constraint {
    match sense {
        ConstraintSense::Le => constraint::leq(lhs, rhs),
        ConstraintSense::Ge => constraint::geq(lhs, rhs),
        ConstraintSense::Eq => constraint::eq(lhs, rhs),
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::dea::formulate::VariableBounds;

    fn program(
        sense: ObjectiveSense,
        objective: &[f64],
        rows: &[&[f64]],
        row_senses: Vec<ConstraintSense>,
        rhs: &[f64],
    ) -> LinearProgram {
        let n_vars = objective.len();
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        LinearProgram {
            target: 0,
            sense,
            objective: DVector::from_column_slice(objective),
            constraints: DMatrix::from_row_slice(rows.len(), n_vars, &flat),
            row_senses,
            rhs: DVector::from_column_slice(rhs),
            bounds: vec![VariableBounds::NON_NEGATIVE; n_vars],
        }
    }

    #[test]
    fn solves_small_maximisation() {
        // max x + y  s.t.  x + 2y ≤ 4,  3x + y ≤ 6  →  x = 1.6, y = 1.2
        let lp = program(
            ObjectiveSense::Maximize,
            &[1.0, 1.0],
            &[&[1.0, 2.0], &[3.0, 1.0]],
            vec![ConstraintSense::Le, ConstraintSense::Le],
            &[4.0, 6.0],
        );

        let SolveOutcome::Optimal { values, objective } = MicroLpSolver.solve(&lp) else {
            panic!("expected optimal");
        };
        assert!((values[0] - 1.6).abs() < 1e-6);
        assert!((values[1] - 1.2).abs() < 1e-6);
        assert!((objective - 2.8).abs() < 1e-6);
    }

    #[test]
    fn honours_free_variables_and_equalities() {
        // min x  s.t.  x - y = -3,  y ≤ 1, x free  →  x = -3 at y = 0
        let mut lp = program(
            ObjectiveSense::Minimize,
            &[1.0, 0.0],
            &[&[1.0, -1.0], &[0.0, 1.0]],
            vec![ConstraintSense::Eq, ConstraintSense::Le],
            &[-3.0, 1.0],
        );
        lp.bounds[0] = VariableBounds::FREE;

        let SolveOutcome::Optimal { values, .. } = MicroLpSolver.solve(&lp) else {
            panic!("expected optimal");
        };
        assert!((values[0] + 3.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasible() {
        // x ≥ 2 and x ≤ 1
        let lp = program(
            ObjectiveSense::Minimize,
            &[1.0],
            &[&[1.0], &[1.0]],
            vec![ConstraintSense::Ge, ConstraintSense::Le],
            &[2.0, 1.0],
        );
        assert_eq!(MicroLpSolver.solve(&lp), SolveOutcome::Infeasible);
    }

    #[test]
    fn reports_unbounded() {
        // max x  s.t.  x ≥ 1
        let lp = program(
            ObjectiveSense::Maximize,
            &[1.0],
            &[&[1.0]],
            vec![ConstraintSense::Ge],
            &[1.0],
        );
        assert_eq!(MicroLpSolver.solve(&lp), SolveOutcome::Unbounded);
    }

    #[test]
    fn malformed_program_is_a_numerical_failure() {
        let mut lp = program(
            ObjectiveSense::Minimize,
            &[1.0],
            &[&[1.0]],
            vec![ConstraintSense::Ge],
            &[1.0],
        );
        lp.bounds.clear();
        assert!(matches!(MicroLpSolver.solve(&lp), SolveOutcome::NumericalFailure(_)));
    }

    fn payload_of(f: impl FnOnce() + std::panic::UnwindSafe) -> Box<dyn Any + Send> {
        match catch_unwind(f) {
            Ok(()) => panic!("closure did not panic"),
            Err(payload) => payload,
        }
    }

    #[test]
    fn panic_payloads_become_failure_detail() {
        let literal = payload_of(|| panic!("pivot on zero"));
        assert_eq!(panic_message(&*literal), "pivot on zero");

        let formatted = payload_of(|| panic!("row {} degenerate", 3));
        assert_eq!(panic_message(&*formatted), "row 3 degenerate");

        let other = payload_of(|| std::panic::panic_any(7_u8));
        assert_eq!(panic_message(&*other), "unknown panic payload");
    }
}
