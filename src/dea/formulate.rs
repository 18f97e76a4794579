//! Envelopment LP construction for a single target DMU.
//!
//! Variable layout (shared with the solver adapter and the engine):
//!
//! - column `0`: the radial factor (θ for input orientation, φ for output)
//! - columns `1..=n`: λ_1..λ_n, one peer weight per DMU (the target included)
//!
//! Input orientation:
//!
//! ```text
//! minimize  θ
//! s.t.      Σ_j λ_j x_ij − θ x_ik ≤ 0      (each input i)
//!           Σ_j λ_j y_rj          ≥ y_rk   (each output r)
//! ```
//!
//! Output orientation:
//!
//! ```text
//! maximize  φ
//! s.t.      Σ_j λ_j x_ij          ≤ x_ik   (each input i)
//!           Σ_j λ_j y_rj − φ y_rk ≥ 0      (each output r)
//! ```
//!
//! VRS appends the convexity row `Σ_j λ_j = 1`. λ ≥ 0; the radial factor is
//! left free.
//!
//! Row order is: inputs, outputs, then convexity.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Orientation, ReturnsToScale, UnitTable};
use crate::error::DeaError;

/// Column index of the radial factor.
pub const RADIAL_VAR: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    /// `a·x ≤ b`
    Le,
    /// `a·x ≥ b`
    Ge,
    /// `a·x = b`
    Eq,
}

/// Per-variable bounds; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl VariableBounds {
    pub const FREE: Self = Self { lower: None, upper: None };
    pub const NON_NEGATIVE: Self = Self {
        lower: Some(0.0),
        upper: None,
    };
}

/// A solver-agnostic linear program in dense form.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// Table position of the DMU this program evaluates.
    pub target: usize,
    pub sense: ObjectiveSense,
    pub objective: DVector<f64>,
    /// One row per constraint, one column per variable.
    pub constraints: DMatrix<f64>,
    pub row_senses: Vec<ConstraintSense>,
    pub rhs: DVector<f64>,
    pub bounds: Vec<VariableBounds>,
}

impl LinearProgram {
    pub fn n_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn n_rows(&self) -> usize {
        self.constraints.nrows()
    }

    /// Largest constraint or bound violation of `x`, scaled by row magnitude.
    ///
    /// Each row's violation is divided by `1 + |b_i| + Σ_j |a_ij x_j|`, so the
    /// result is comparable across tables with very different units.
    pub fn max_relative_violation(&self, x: &[f64]) -> f64 {
        if x.len() != self.n_vars() {
            return f64::INFINITY;
        }

        let mut worst = 0.0_f64;
        for (row, sense) in self.row_senses.iter().enumerate() {
            let mut lhs = 0.0;
            let mut scale = 1.0 + self.rhs[row].abs();
            for (col, &xj) in x.iter().enumerate() {
                let term = self.constraints[(row, col)] * xj;
                lhs += term;
                scale += term.abs();
            }
            let diff = lhs - self.rhs[row];
            let violation = match sense {
                ConstraintSense::Le => diff.max(0.0),
                ConstraintSense::Ge => (-diff).max(0.0),
                ConstraintSense::Eq => diff.abs(),
            };
            worst = worst.max(violation / scale);
        }

        for (bounds, &xj) in self.bounds.iter().zip(x) {
            if let Some(lo) = bounds.lower {
                worst = worst.max((lo - xj).max(0.0) / (1.0 + lo.abs()));
            }
            if let Some(hi) = bounds.upper {
                worst = worst.max((xj - hi).max(0.0) / (1.0 + hi.abs()));
            }
        }

        if worst.is_nan() { f64::INFINITY } else { worst }
    }
}

/// Build the envelopment LP for DMU `target`.
pub fn formulate(
    table: &UnitTable,
    target: usize,
    orientation: Orientation,
    returns_to_scale: ReturnsToScale,
) -> Result<LinearProgram, DeaError> {
    let n = table.len();
    let m = table.n_inputs();
    let s = table.n_outputs();

    if target >= n {
        return Err(DeaError::validation(format!(
            "target DMU index {target} out of range for {n} DMUs"
        )));
    }

    let x = table.inputs();
    let y = table.outputs();
    if x.nrows() != n || y.nrows() != n {
        return Err(DeaError::validation("input/output matrices are not rectangular"));
    }

    let convexity = returns_to_scale == ReturnsToScale::Vrs;
    let n_rows = m + s + usize::from(convexity);
    let n_vars = 1 + n;

    let mut a = DMatrix::<f64>::zeros(n_rows, n_vars);
    let mut rhs = DVector::<f64>::zeros(n_rows);
    let mut row_senses = Vec::with_capacity(n_rows);

    for i in 0..m {
        for j in 0..n {
            a[(i, 1 + j)] = x[(j, i)];
        }
        match orientation {
            Orientation::Input => a[(i, RADIAL_VAR)] = -x[(target, i)],
            Orientation::Output => rhs[i] = x[(target, i)],
        }
        row_senses.push(ConstraintSense::Le);
    }

    for r in 0..s {
        let row = m + r;
        for j in 0..n {
            a[(row, 1 + j)] = y[(j, r)];
        }
        match orientation {
            Orientation::Input => rhs[row] = y[(target, r)],
            Orientation::Output => a[(row, RADIAL_VAR)] = -y[(target, r)],
        }
        row_senses.push(ConstraintSense::Ge);
    }

    if convexity {
        let row = m + s;
        for j in 0..n {
            a[(row, 1 + j)] = 1.0;
        }
        rhs[row] = 1.0;
        row_senses.push(ConstraintSense::Eq);
    }

    let mut objective = DVector::<f64>::zeros(n_vars);
    objective[RADIAL_VAR] = 1.0;

    let sense = match orientation {
        Orientation::Input => ObjectiveSense::Minimize,
        Orientation::Output => ObjectiveSense::Maximize,
    };

    let mut bounds = vec![VariableBounds::NON_NEGATIVE; n_vars];
    bounds[RADIAL_VAR] = VariableBounds::FREE;

    Ok(LinearProgram {
        target,
        sense,
        objective,
        constraints: a,
        row_senses,
        rhs,
        bounds,
    })
}
