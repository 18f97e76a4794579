//! Result serialization.
//!
//! - the two-line JSON wire payload written to stdout by `dea score`
//! - an optional per-unit CSV export for spreadsheets and downstream scripts

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::domain::{DmuOutcome, DmuResult};
use crate::error::AppError;
use crate::report::Rankings;

/// Field name carrying the score in each ranked record.
pub const SCORE_FIELD: &str = "efficiency_score";

/// Ranked `{<id column>: id, efficiency_score: score}` records.
///
/// Failed units keep their slot at the end with a `null` score so consumers
/// can tell them apart from real results. `id_values` holds the identifiers
/// as read (by table row); missing entries fall back to the string id.
pub fn score_records(rankings: &Rankings, id_column: &str, id_values: &[Value]) -> Value {
    let records = rankings
        .ranked
        .iter()
        .map(|r| {
            let score = r
                .score()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null);
            let mut obj = Map::new();
            obj.insert(id_column.to_string(), source_id(r, id_values));
            obj.insert(SCORE_FIELD.to_string(), score);
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

/// Efficient identifiers in ranking order, typed like the source.
pub fn efficient_ids(rankings: &Rankings, id_values: &[Value]) -> Value {
    Value::Array(
        rankings
            .ranked
            .iter()
            .filter(|r| r.is_efficient())
            .map(|r| source_id(r, id_values))
            .collect(),
    )
}

fn source_id(result: &DmuResult, id_values: &[Value]) -> Value {
    id_values
        .get(result.index)
        .cloned()
        .unwrap_or_else(|| Value::String(result.id.clone()))
}

/// Write both payload lines: ranked records, then efficient identifiers.
pub fn write_payload<W: Write>(
    out: &mut W,
    rankings: &Rankings,
    id_column: &str,
    id_values: &[Value],
) -> Result<(), AppError> {
    let records = serde_json::to_string(&score_records(rankings, id_column, id_values))
        .map_err(|e| AppError::new(4, format!("Failed to serialize scores: {e}")))?;
    let efficient = serde_json::to_string(&efficient_ids(rankings, id_values))
        .map_err(|e| AppError::new(4, format!("Failed to serialize efficient units: {e}")))?;

    writeln!(out, "{records}").map_err(|e| AppError::new(2, format!("Failed to write output: {e}")))?;
    writeln!(out, "{efficient}").map_err(|e| AppError::new(2, format!("Failed to write output: {e}")))?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write output: {e}")))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    rank: usize,
    id: &'a str,
    score: Option<f64>,
    is_efficient: bool,
    status: &'a str,
    peers: String,
}

/// Write per-unit results to a CSV file, in ranking order.
pub fn write_results_csv(path: &Path, rankings: &Rankings) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for (pos, r) in rankings.ranked.iter().enumerate() {
        let (status, peers) = match &r.outcome {
            DmuOutcome::Scored(e) => {
                let peers: Vec<String> = e.peers.iter().map(|p| format!("{}:{:.6}", p.id, p.lambda)).collect();
                ("ok", peers.join(";"))
            }
            DmuOutcome::Failed(reason) => ("failed", reason.clone()),
        };
        writer
            .serialize(ExportRow {
                rank: pos + 1,
                id: &r.id,
                score: r.score(),
                is_efficient: r.is_efficient(),
                status,
                peers,
            })
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))?;
    Ok(())
}
