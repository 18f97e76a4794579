//! Human-readable terminal output for `dea report`.

use crate::domain::{DeaConfig, DeaRun, DmuOutcome, DmuResult};
use crate::io::ingest::IngestedData;
use crate::report::{Rankings, score_stats};

/// Peers shown per row before the list is elided.
const MAX_PEERS_SHOWN: usize = 4;

/// Format the run summary (dataset, model, score distribution, failures).
pub fn format_run_summary(ingest: &IngestedData, run: &DeaRun, rankings: &Rankings, config: &DeaConfig) -> String {
    let table = &ingest.table;
    let mut out = String::new();

    out.push_str("=== dea - Data Envelopment Analysis ===\n");
    out.push_str(&format!(
        "Model: {} | {}\n",
        config.engine.orientation.display_name(),
        config.engine.returns_to_scale.display_name()
    ));
    out.push_str(&format!(
        "Units: n={} ({:?}, {} rows read) | id column: `{}`\n",
        table.len(),
        ingest.format,
        ingest.rows_read,
        config.id_column
    ));
    out.push_str(&format!("Inputs : {}\n", table.input_names().join(", ")));
    out.push_str(&format!("Outputs: {}\n", table.output_names().join(", ")));

    if let Some(stats) = score_stats(run) {
        out.push_str(&format!(
            "Scores: scored={} | min={:.4} | max={:.4} | mean={:.4}\n",
            stats.scored, stats.min, stats.max, stats.mean
        ));
    }
    out.push_str(&format!(
        "Efficient: {} of {} (tolerance {:e})\n",
        rankings.efficient.len(),
        table.len(),
        config.engine.tolerance
    ));

    if !rankings.failed.is_empty() {
        out.push_str(&format!(
            "Failed ({}): {}\n",
            rankings.failed.len(),
            rankings.failed.join(", ")
        ));
        out.push_str("  Scores for failed units are unreliable and reported as null.\n");
    }
    out.push('\n');

    out
}

/// Format the ranking table (top `top_n` rows; 0 shows all).
pub fn format_rankings(rankings: &Rankings, top_n: usize) -> String {
    let rows: &[DmuResult] = if top_n == 0 || top_n >= rankings.ranked.len() {
        &rankings.ranked
    } else {
        &rankings.ranked[..top_n]
    };

    let mut out = String::new();
    out.push_str("Ranking (descending efficiency):\n");
    out.push_str(
        format!(
            "{:>4} {:<24} {:>10} {:<3} {}\n",
            "rank", "id", "score", "eff", "peers (lambda)"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<4} {:-<24} {:-<10} {:-<3} {:-<14}", "", "", "", "", "").trim_end());
    out.push('\n');

    for (pos, r) in rows.iter().enumerate() {
        let (score, eff, peers) = match &r.outcome {
            DmuOutcome::Scored(e) => (
                format!("{:.6}", e.score),
                if e.is_efficient { "*" } else { "" },
                fmt_peers(e.peers.iter().map(|p| (p.id.as_str(), p.lambda))),
            ),
            DmuOutcome::Failed(reason) => ("null".to_string(), "", format!("failed: {reason}")),
        };
        out.push_str(
            format!(
                "{:>4} {:<24} {:>10} {:<3} {}",
                pos + 1,
                truncate(&r.id, 24),
                score,
                eff,
                peers
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if rows.len() < rankings.ranked.len() {
        out.push_str(&format!("... {} more\n", rankings.ranked.len() - rows.len()));
    }

    out
}

/// Format per-unit slacks for units that carry any (non-zero) slack.
pub fn format_slacks(rankings: &Rankings, input_names: &[String], output_names: &[String]) -> String {
    let mut out = String::new();

    for r in &rankings.ranked {
        let Some(e) = r.efficiency() else { continue };
        let inputs: Vec<String> = input_names
            .iter()
            .zip(&e.input_slacks)
            .filter(|(_, s)| **s != 0.0)
            .map(|(name, s)| format!("{name}-={s:.4}"))
            .collect();
        let outputs: Vec<String> = output_names
            .iter()
            .zip(&e.output_slacks)
            .filter(|(_, s)| **s != 0.0)
            .map(|(name, s)| format!("{name}+={s:.4}"))
            .collect();
        if inputs.is_empty() && outputs.is_empty() {
            continue;
        }

        let parts: Vec<String> = inputs.into_iter().chain(outputs).collect();
        out.push_str(&format!("  {:<24} {}\n", truncate(&r.id, 24), parts.join(" ")));
    }

    if out.is_empty() {
        return String::new();
    }
    format!("Slacks (input excess -, output shortfall +):\n{out}")
}

fn fmt_peers<'a>(peers: impl Iterator<Item = (&'a str, f64)>) -> String {
    let all: Vec<String> = peers.map(|(id, l)| format!("{id}({l:.3})")).collect();
    if all.len() <= MAX_PEERS_SHOWN {
        return all.join(", ");
    }
    format!("{}, +{}", all[..MAX_PEERS_SHOWN].join(", "), all.len() - MAX_PEERS_SHOWN)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
