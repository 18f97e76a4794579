//! Reporting: ranking, score statistics, and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the engine stays free of presentation concerns
//! - output changes are localized

pub mod format;

pub use format::*;

use tracing::debug;

use crate::domain::{DeaRun, DmuResult};

/// DMUs in ranking order plus the derived subsets the wire format needs.
#[derive(Debug, Clone)]
pub struct Rankings {
    /// Scored DMUs by descending score (ties keep table order), failed DMUs last.
    pub ranked: Vec<DmuResult>,
    /// Identifiers with `is_efficient`, in ranking order.
    pub efficient: Vec<String>,
    /// Identifiers whose solve failed, in table order.
    pub failed: Vec<String>,
}

/// Min / max / mean over the scored DMUs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreStats {
    pub scored: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Sort a run's results by descending efficiency score.
pub fn rank_by_score(run: &DeaRun) -> Rankings {
    let (mut scored, failed): (Vec<DmuResult>, Vec<DmuResult>) =
        run.results.iter().cloned().partition(|r| r.score().is_some());

    // `sort_by` is stable, so equal scores keep table order.
    scored.sort_by(|a, b| {
        let (sa, sb) = (a.score().unwrap_or(f64::NAN), b.score().unwrap_or(f64::NAN));
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    let efficient: Vec<String> = scored
        .iter()
        .filter(|r| r.is_efficient())
        .map(|r| r.id.clone())
        .collect();

    let top: Vec<(&str, f64)> = scored
        .iter()
        .take(5)
        .filter_map(|r| r.score().map(|s| (r.id.as_str(), s)))
        .collect();
    debug!(?top, "top units by efficiency");
    debug!(?efficient, "efficient units");

    let failed_ids = failed.iter().map(|r| r.id.clone()).collect();
    scored.extend(failed);

    Rankings {
        ranked: scored,
        efficient,
        failed: failed_ids,
    }
}

/// Summary statistics over scored DMUs; `None` when nothing was scored.
pub fn score_stats(run: &DeaRun) -> Option<ScoreStats> {
    let scores: Vec<f64> = run.results.iter().filter_map(DmuResult::score).collect();
    if scores.is_empty() {
        return None;
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;

    Some(ScoreStats {
        scored: scores.len(),
        min,
        max,
        mean,
    })
}
