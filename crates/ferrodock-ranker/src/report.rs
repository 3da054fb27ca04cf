//! Hit statistics and the human-readable top-K summary.

use std::fmt::Write as _;
use std::path::Path;

use ferrodock_common::Result;
use serde::Serialize;

use crate::aggregate::RankedTask;

/// Screen-level statistics over each task's best affinity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitStatistics {
    pub total: usize,
    /// Tasks at or below the threshold.
    pub hits: usize,
    /// Percent of `total`.
    pub hit_rate: f64,
    pub threshold: f64,
    pub best: Option<f64>,
}

impl HitStatistics {
    pub fn from_ranking(ranking: &[RankedTask], threshold: f64) -> Self {
        let total = ranking.len();
        let hits = ranking.iter().filter(|r| r.best_affinity <= threshold).count();
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };
        let best = ranking.iter().map(|r| r.best_affinity).reduce(f64::min);
        Self {
            total,
            hits,
            hit_rate,
            threshold,
            best,
        }
    }
}

pub const NO_RESULTS: &str = "No results.";

/// Top `k` of `ranking` followed by the hit statistics.
pub fn render_top_hits(ranking: &[RankedTask], k: usize, stats: &HitStatistics) -> String {
    if ranking.is_empty() {
        return format!("{NO_RESULTS}\n");
    }

    let shown = ranking.len().min(k);
    let width = ranking
        .iter()
        .take(shown)
        .map(|r| r.task_id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("Ligand".len());

    let mut out = String::new();
    let _ = writeln!(out, "Top {shown} hits (kcal/mol, lower is stronger)");
    let _ = writeln!(out, "{:<4}  {:<width$}  {:>9}  {:>4}", "Rank", "Ligand", "Affinity", "Mode");
    for (i, r) in ranking.iter().take(shown).enumerate() {
        let _ = writeln!(
            out,
            "{:<4}  {:<width$}  {:>9.3}  {:>4}",
            i + 1,
            r.task_id.as_str(),
            r.best_affinity,
            r.best_mode
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Total compounds: {}", stats.total);
    let _ = writeln!(
        out,
        "Hits (<= {:.1}): {} ({:.1}%)",
        stats.threshold, stats.hits, stats.hit_rate
    );
    if let Some(best) = stats.best {
        let _ = writeln!(out, "Best score: {best:.2} kcal/mol");
    }
    out
}

pub async fn write_top_hits(path: &Path, ranking: &[RankedTask], k: usize, stats: &HitStatistics) -> Result<()> {
    tokio::fs::write(path, render_top_hits(ranking, k, stats)).await?;
    Ok(())
}
