//! Upfront checks on a Unit Table.
//!
//! Every check here runs before the first LP is built, so a bad table fails the
//! whole run with one diagnostic instead of surfacing as NaN scores later.
//! Messages name the offending row (1-based position + identifier) and column.

use std::collections::HashMap;

use crate::domain::UnitTable;
use crate::error::DeaError;

/// Minimum number of DMUs for the envelopment model to be meaningful.
pub const MIN_DMUS: usize = 2;

/// Validate a table for scoring. Returns the first violation found.
pub fn validate_table(table: &UnitTable) -> Result<(), DeaError> {
    let n = table.len();
    if n < MIN_DMUS {
        return Err(DeaError::validation(format!(
            "need at least {MIN_DMUS} DMUs to score, got {n}"
        )));
    }
    if table.n_inputs() == 0 {
        return Err(DeaError::validation("no input columns configured"));
    }
    if table.n_outputs() == 0 {
        return Err(DeaError::validation("no output columns configured"));
    }

    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(n);
    for (j, id) in table.ids().iter().enumerate() {
        if let Some(first) = seen.insert(id.as_str(), j) {
            return Err(DeaError::validation(format!(
                "duplicate identifier '{id}' at rows {} and {}",
                first + 1,
                j + 1
            )));
        }
    }

    for j in 0..n {
        for (i, name) in table.input_names().iter().enumerate() {
            check_cell(table, j, "input", name, table.inputs()[(j, i)])?;
        }
        for (r, name) in table.output_names().iter().enumerate() {
            check_cell(table, j, "output", name, table.outputs()[(j, r)])?;
        }
    }

    Ok(())
}

fn check_cell(table: &UnitTable, row: usize, role: &str, column: &str, value: f64) -> Result<(), DeaError> {
    let problem = if !value.is_finite() {
        "is not finite"
    } else if value < 0.0 {
        "is negative"
    } else if value == 0.0 {
        "is zero"
    } else {
        return Ok(());
    };

    Err(DeaError::validation(format!(
        "row {} ({}): {role} `{column}` {problem} ({value})",
        row + 1,
        table.id(row)
    )))
}
