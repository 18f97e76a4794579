//! Shared "scoring pipeline" used by both `score` and `report`.
//!
//! load records -> validate + score every unit -> rank
//!
//! The subcommands then only differ in presentation (JSON payload vs text).

use tracing::debug;

use crate::dea::{DeaEngine, MicroLpSolver};
use crate::domain::{DeaConfig, DeaRun};
use crate::error::AppError;
use crate::io::ingest::IngestedData;
use crate::report::{Rankings, rank_by_score, score_stats};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub run: DeaRun,
    pub rankings: Rankings,
}

/// Execute the full pipeline, reading records from the configured source.
pub fn run_dea(config: &DeaConfig) -> Result<RunOutput, AppError> {
    let ingest = crate::io::ingest::load_units(config)?;
    run_dea_with_table(config, ingest)
}

/// Execute the pipeline on records that were already loaded.
pub fn run_dea_with_table(config: &DeaConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    debug!(
        units = ingest.table.len(),
        inputs = ingest.table.n_inputs(),
        outputs = ingest.table.n_outputs(),
        input_min = ingest.table.inputs().min(),
        input_max = ingest.table.inputs().max(),
        output_min = ingest.table.outputs().min(),
        output_max = ingest.table.outputs().max(),
        "unit table loaded"
    );

    let engine = DeaEngine::new(MicroLpSolver, config.engine.clone());
    let run = engine.evaluate(&ingest.table)?;
    let rankings = rank_by_score(&run);

    if let Some(stats) = score_stats(&run) {
        debug!(
            scored = stats.scored,
            min = stats.min,
            max = stats.max,
            mean = stats.mean,
            "score distribution"
        );
    }

    Ok(RunOutput { ingest, run, rankings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineOptions, InputFormat, Orientation, ReturnsToScale};
    use crate::io::ingest::{ColumnSpec, parse_json_records};

    const COUNTRIES: &str = r#"[
        {"country": "Norway",  "freedom_expression_i": 1.0, "freedom_expression_ii": 1.0, "freedom_expression_iii": 1.0, "media_freedom_rsf_index": 95.2, "media_freedom_ii": 0.98},
        {"country": "Estonia", "freedom_expression_i": 1.0, "freedom_expression_ii": 1.1, "freedom_expression_iii": 1.0, "media_freedom_rsf_index": 89.5, "media_freedom_ii": 0.95},
        {"country": "Chile",   "freedom_expression_i": 2.0, "freedom_expression_ii": 2.0, "freedom_expression_iii": 2.0, "media_freedom_rsf_index": 70.1, "media_freedom_ii": 0.81},
        {"country": "India",   "freedom_expression_i": 3.0, "freedom_expression_ii": 2.5, "freedom_expression_iii": 3.0, "media_freedom_rsf_index": 36.6, "media_freedom_ii": 0.55}
    ]"#;

    fn config() -> DeaConfig {
        DeaConfig {
            input_path: None,
            format: InputFormat::Json,
            id_column: "country".to_string(),
            input_columns: crate::app::DEFAULT_INPUT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            output_columns: crate::app::DEFAULT_OUTPUT_COLUMNS.iter().map(|s| s.to_string()).collect(),
            engine: EngineOptions::default(),
            top_n: 0,
            export_results: None,
        }
    }

    fn ingest(config: &DeaConfig, text: &str) -> IngestedData {
        parse_json_records(text, &ColumnSpec::from_config(config)).unwrap()
    }

    #[test]
    fn ranks_countries_with_best_practice_first() {
        let config = config();
        let out = run_dea_with_table(&config, ingest(&config, COUNTRIES)).unwrap();

        assert_eq!(out.rankings.ranked.len(), 4);
        assert_eq!(out.rankings.ranked[0].id, "Norway");
        assert!((out.rankings.ranked[0].score().unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(out.rankings.efficient, vec!["Norway".to_string()]);
        assert!(out.rankings.failed.is_empty());

        let scores: Vec<f64> = out.rankings.ranked.iter().filter_map(|r| r.score()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(scores.iter().all(|s| *s > 0.0 && *s <= 1.0 + 1e-9));
    }

    #[test]
    fn vrs_output_orientation_runs_end_to_end() {
        let mut config = config();
        config.engine = EngineOptions {
            orientation: Orientation::Output,
            returns_to_scale: ReturnsToScale::Vrs,
            ..EngineOptions::default()
        };
        let out = run_dea_with_table(&config, ingest(&config, COUNTRIES)).unwrap();
        assert_eq!(out.run.results.len(), 4);
        assert!(out.rankings.efficient.contains(&"Norway".to_string()));
    }

    #[test]
    fn invalid_values_surface_as_validation_errors() {
        let config = config();
        let text = COUNTRIES.replace("\"freedom_expression_i\": 2.0", "\"freedom_expression_i\": -2.0");
        let err = run_dea_with_table(&config, ingest(&config, &text)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Chile"));
    }
}
