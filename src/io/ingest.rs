//! Dataset loading: record list -> Unit Table.
//!
//! This module turns a JSON array of flat records (or a CSV with a header row)
//! into the immutable `UnitTable` the engine scores.
//!
//! Design goals:
//! - **Strict schema** for configured columns (missing column/value is fatal)
//! - **Row-addressed errors** (1-based row + identifier + column name)
//! - **Lenient numbers**: JSON numbers or numeric strings are both accepted
//! - **No scoring logic here**; value-range checks live in `dea::validate`

use std::collections::HashMap;
use std::io::Read;

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{DeaConfig, InputFormat, UnitTable};
use crate::error::{AppError, DeaError};

/// Which record fields feed the table.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub id: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl ColumnSpec {
    pub fn from_config(config: &DeaConfig) -> Self {
        Self {
            id: config.id_column.clone(),
            inputs: config.input_columns.clone(),
            outputs: config.output_columns.clone(),
        }
    }
}

/// Loader output: the table plus a little provenance for reporting.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub table: UnitTable,
    pub rows_read: usize,
    pub format: InputFormat,
    /// Identifier values as they appeared in the source, aligned to table rows.
    /// JSON numbers stay numbers; CSV identifiers are always strings.
    pub id_values: Vec<Value>,
}

/// Read the configured source (file or stdin) and build the Unit Table.
pub fn load_units(config: &DeaConfig) -> Result<IngestedData, AppError> {
    let text = match &config.input_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| AppError::new(2, format!("Failed to read input '{}': {e}", path.display())))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| AppError::new(2, format!("Failed to read standard input: {e}")))?;
            buf
        }
    };

    debug!(
        bytes = text.len(),
        head = %text.chars().take(100).collect::<String>(),
        "read input"
    );

    let columns = ColumnSpec::from_config(config);
    let ingest = match config.format {
        InputFormat::Json => parse_json_records(&text, &columns)?,
        InputFormat::Csv => parse_csv_records(text.as_bytes(), &columns)?,
    };
    Ok(ingest)
}

/// Parse a JSON array of flat objects.
pub fn parse_json_records(text: &str, columns: &ColumnSpec) -> Result<IngestedData, DeaError> {
    let records: Vec<Map<String, Value>> = serde_json::from_str(text)
        .map_err(|e| DeaError::validation(format!("input is not a JSON array of objects: {e}")))?;

    debug!(records = records.len(), "parsed JSON records");
    if let Some(first) = records.first() {
        let sample = Value::Object(first.clone());
        debug!(%sample, "sample record");
    }

    let mut rows = RowCollector::new(records.len());
    for (idx, record) in records.iter().enumerate() {
        let line = idx + 1;
        let (id, id_value) = json_identifier(record.get(&columns.id), line, &columns.id)?;

        let inputs = columns
            .inputs
            .iter()
            .map(|col| json_number(record.get(col), line, &id, col))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = columns
            .outputs
            .iter()
            .map(|col| json_number(record.get(col), line, &id, col))
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(id, id_value, inputs, outputs);
    }

    rows.finish(columns, InputFormat::Json)
}

/// Parse CSV with a header row.
pub fn parse_csv_records<R: Read>(reader: R, columns: &ColumnSpec) -> Result<IngestedData, DeaError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DeaError::validation(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect();

    let column_index = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| DeaError::validation(format!("missing required column `{name}`")))
    };
    let id_idx = column_index(&columns.id)?;
    let input_idx = columns.inputs.iter().map(|c| column_index(c)).collect::<Result<Vec<_>, _>>()?;
    let output_idx = columns.outputs.iter().map(|c| column_index(c)).collect::<Result<Vec<_>, _>>()?;

    let mut rows = RowCollector::new(0);
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 1;
        let record = result.map_err(|e| DeaError::validation(format!("row {line}: CSV parse error: {e}")))?;

        let id = record
            .get(id_idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DeaError::validation(format!("row {line}: missing identifier `{}`", columns.id)))?
            .to_string();

        let cell = |col_idx: usize, name: &str| -> Result<f64, DeaError> {
            let raw = record.get(col_idx).unwrap_or("");
            parse_number(raw, line, &id, name)
        };
        let inputs = input_idx
            .iter()
            .zip(&columns.inputs)
            .map(|(&i, name)| cell(i, name))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = output_idx
            .iter()
            .zip(&columns.outputs)
            .map(|(&i, name)| cell(i, name))
            .collect::<Result<Vec<_>, _>>()?;

        let id_value = Value::String(id.clone());
        rows.push(id, id_value, inputs, outputs);
    }

    rows.finish(columns, InputFormat::Csv)
}

struct RowCollector {
    ids: Vec<String>,
    id_values: Vec<Value>,
    inputs: Vec<Vec<f64>>,
    outputs: Vec<Vec<f64>>,
}

impl RowCollector {
    fn new(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            id_values: Vec::with_capacity(capacity),
            inputs: Vec::with_capacity(capacity),
            outputs: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, id: String, id_value: Value, inputs: Vec<f64>, outputs: Vec<f64>) {
        self.ids.push(id);
        self.id_values.push(id_value);
        self.inputs.push(inputs);
        self.outputs.push(outputs);
    }

    fn finish(self, columns: &ColumnSpec, format: InputFormat) -> Result<IngestedData, DeaError> {
        let rows_read = self.ids.len();
        let table = UnitTable::from_rows(
            self.ids,
            columns.inputs.clone(),
            columns.outputs.clone(),
            &self.inputs,
            &self.outputs,
        )?;

        debug!(
            dmus = table.len(),
            inputs = ?table.input_names(),
            outputs = ?table.output_names(),
            "built unit table"
        );
        if let Some(first) = table.ids().first() {
            debug!(
                dmu = %first,
                x = ?table.inputs().row(0).iter().collect::<Vec<_>>(),
                y = ?table.outputs().row(0).iter().collect::<Vec<_>>(),
                "sample row"
            );
        }

        Ok(IngestedData {
            table,
            rows_read,
            format,
            id_values: self.id_values,
        })
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Identifier as table key plus the value to echo back in the payload.
fn json_identifier(value: Option<&Value>, line: usize, column: &str) -> Result<(String, Value), DeaError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            let id = s.trim().to_string();
            Ok((id.clone(), Value::String(id)))
        }
        Some(Value::Number(n)) => Ok((n.to_string(), Value::Number(n.clone()))),
        _ => Err(DeaError::validation(format!(
            "row {line}: missing identifier `{column}`"
        ))),
    }
}

fn json_number(value: Option<&Value>, line: usize, id: &str, column: &str) -> Result<f64, DeaError> {
    match value {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            DeaError::validation(format!("row {line} ({id}): `{column}` is out of f64 range"))
        }),
        Some(Value::String(s)) => parse_number(s, line, id, column),
        None | Some(Value::Null) => Err(DeaError::validation(format!(
            "row {line} ({id}): missing value for `{column}`"
        ))),
        Some(other) => Err(DeaError::validation(format!(
            "row {line} ({id}): `{column}` is not numeric ({other})"
        ))),
    }
}

fn parse_number(raw: &str, line: usize, id: &str, column: &str) -> Result<f64, DeaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DeaError::validation(format!(
            "row {line} ({id}): missing value for `{column}`"
        )));
    }
    raw.parse::<f64>().map_err(|_| {
        DeaError::validation(format!("row {line} ({id}): `{column}` is not numeric ('{raw}')"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnSpec {
        ColumnSpec {
            id: "country".to_string(),
            inputs: vec!["fe_i".to_string(), "fe_ii".to_string()],
            outputs: vec!["rsf".to_string()],
        }
    }

    #[test]
    fn json_records_build_a_table() {
        let text = r#"[
            {"country": "Austria", "fe_i": 0.8, "fe_ii": "0.7", "rsf": 77.3, "region": "EU"},
            {"country": "Belgium", "fe_i": 0.9, "fe_ii": 0.6, "rsf": 80}
        ]"#;
        let ingest = parse_json_records(text, &columns()).unwrap();

        assert_eq!(ingest.rows_read, 2);
        assert_eq!(ingest.format, InputFormat::Json);
        let t = &ingest.table;
        assert_eq!(t.ids(), ["Austria".to_string(), "Belgium".to_string()]);
        assert_eq!(t.inputs()[(0, 1)], 0.7);
        assert_eq!(t.outputs()[(1, 0)], 80.0);
        assert_eq!(t.input_names(), ["fe_i".to_string(), "fe_ii".to_string()]);
    }

    #[test]
    fn json_numeric_identifiers_are_accepted() {
        let text = r#"[{"country": 42, "fe_i": 1, "fe_ii": 1, "rsf": 1}]"#;
        let ingest = parse_json_records(text, &columns()).unwrap();
        assert_eq!(ingest.table.id(0), "42");
        assert_eq!(ingest.id_values, vec![serde_json::json!(42)]);
    }

    #[test]
    fn json_missing_value_names_row_and_column() {
        let text = r#"[
            {"country": "Austria", "fe_i": 0.8, "fe_ii": 0.7, "rsf": 77.3},
            {"country": "Belgium", "fe_i": 0.9, "rsf": 80}
        ]"#;
        let err = parse_json_records(text, &columns()).unwrap_err();
        let DeaError::DataValidation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("row 2 (Belgium)"), "{msg}");
        assert!(msg.contains("`fe_ii`"), "{msg}");
    }

    #[test]
    fn json_rejects_non_numeric_and_non_array_input() {
        let text = r#"[{"country": "A", "fe_i": true, "fe_ii": 1, "rsf": 1}]"#;
        assert!(matches!(parse_json_records(text, &columns()), Err(DeaError::DataValidation(m)) if m.contains("not numeric")));

        let text = r#"{"country": "A"}"#;
        assert!(matches!(parse_json_records(text, &columns()), Err(DeaError::DataValidation(m)) if m.contains("JSON array")));
    }

    #[test]
    fn json_missing_identifier_is_rejected() {
        let text = r#"[{"fe_i": 1, "fe_ii": 1, "rsf": 1}]"#;
        assert!(matches!(parse_json_records(text, &columns()), Err(DeaError::DataValidation(m)) if m.contains("identifier")));
    }

    #[test]
    fn csv_with_bom_header_is_parsed() {
        let text = "\u{feff}country,fe_i,fe_ii,rsf,notes\nAustria,0.8,0.7,77.3,x\n Belgium , 0.9 ,0.6,80,\n";
        let ingest = parse_csv_records(text.as_bytes(), &columns()).unwrap();

        assert_eq!(ingest.format, InputFormat::Csv);
        assert_eq!(ingest.table.ids(), ["Austria".to_string(), "Belgium".to_string()]);
        assert_eq!(ingest.table.inputs()[(1, 0)], 0.9);
    }

    #[test]
    fn csv_missing_column_is_rejected() {
        let text = "country,fe_i,rsf\nAustria,0.8,77.3\n";
        let err = parse_csv_records(text.as_bytes(), &columns()).unwrap_err();
        assert!(matches!(err, DeaError::DataValidation(m) if m.contains("`fe_ii`")));
    }

    #[test]
    fn csv_ragged_row_is_rejected() {
        let text = "country,fe_i,fe_ii,rsf\nAustria,0.8,0.7\n";
        let err = parse_csv_records(text.as_bytes(), &columns()).unwrap_err();
        assert!(matches!(err, DeaError::DataValidation(m) if m.contains("row 1")));
    }
}
