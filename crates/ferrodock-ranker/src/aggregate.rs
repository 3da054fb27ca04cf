//! Post-batch aggregation.
//!
//! Runs once after every task has joined. Reads each completed task's log,
//! writes the flat pose table and the ranking summary, and concatenates the
//! best-pose complexes into one multi-structure file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferrodock_common::{Result, RunLayout, TaskId};
use ferrodock_molecules::FormatConverter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::parse::{PoseRecord, VinaLogParser};
use crate::report::{write_top_hits, HitStatistics};

/// Column names read by the affinity plotting script.
pub const SUMMARY_HEADER: [&str; 5] = ["Ligand", "Mode", "Affinity_(kcal/mol)", "RMSD_LB", "RMSD_UB"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTask {
    pub task_id: TaskId,
    pub best_affinity: f64,
    /// Mode whose affinity is `best_affinity`.
    pub best_mode: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    /// Sorted by (task id, mode).
    pub rows: Vec<PoseRecord>,
    /// Ascending affinity, ties by task id.
    pub ranking: Vec<RankedTask>,
    pub combined_artifact_path: Option<PathBuf>,
    pub hits: HitStatistics,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn top(&self, k: usize) -> &[RankedTask] {
        &self.ranking[..self.ranking.len().min(k)]
    }
}

/// Best affinity per task, ranked. Tasks without rows are absent.
pub fn rank(rows: &[PoseRecord]) -> Vec<RankedTask> {
    let mut best: BTreeMap<&TaskId, &PoseRecord> = BTreeMap::new();
    for row in rows {
        best.entry(&row.task_id)
            .and_modify(|current| {
                let better = row.affinity < current.affinity
                    || (row.affinity == current.affinity && row.mode < current.mode);
                if better {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    let mut ranking: Vec<RankedTask> = best
        .into_values()
        .map(|r| {
            if r.mode != 1 {
                warn!(
                    task_id = %r.task_id,
                    mode = r.mode,
                    "Best affinity is not in mode 1; engine ordering looks wrong"
                );
            }
            RankedTask {
                task_id: r.task_id.clone(),
                best_affinity: r.affinity,
                best_mode: r.mode,
            }
        })
        .collect();

    ranking.sort_by(|a, b| {
        a.best_affinity
            .total_cmp(&b.best_affinity)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    ranking
}

/// Numeric columns are written as the engine printed them.
pub fn write_summary_csv(path: &Path, rows: &[PoseRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(SUMMARY_HEADER)?;
    for r in rows {
        let [affinity, rmsd_lb, rmsd_ub] = r.printed_fields();
        writer.write_record([r.task_id.as_str().to_string(), r.mode.to_string(), affinity, rmsd_lb, rmsd_ub])?;
    }
    writer.flush()?;
    Ok(())
}

pub struct ResultAggregator {
    layout: RunLayout,
    converter: Arc<dyn FormatConverter>,
    parser: VinaLogParser,
    top_k: usize,
    hit_threshold: f64,
}

impl ResultAggregator {
    pub fn new(layout: RunLayout, converter: Arc<dyn FormatConverter>, top_k: usize, hit_threshold: f64) -> Self {
        Self {
            layout,
            converter,
            parser: VinaLogParser::new(),
            top_k,
            hit_threshold,
        }
    }

    /// Parse and rank the logs of `completed` without writing anything.
    pub async fn collect<'a, I>(&self, completed: I) -> Result<AggregateReport>
    where
        I: IntoIterator<Item = &'a TaskId>,
    {
        let mut rows = Vec::new();
        for id in completed {
            let log_path = self.layout.task_log(id);
            match tokio::fs::read_to_string(&log_path).await {
                Ok(log) => {
                    let parsed = self.parser.parse(id, &log);
                    if parsed.is_empty() {
                        warn!(task_id = %id, "No mode rows in {:?}", log_path);
                    }
                    rows.extend(parsed);
                }
                Err(e) => warn!(task_id = %id, "Could not read {:?}: {}", log_path, e),
            }
        }

        rows.sort_by(|a, b| a.task_id.cmp(&b.task_id).then(a.mode.cmp(&b.mode)));
        let ranking = rank(&rows);
        let hits = HitStatistics::from_ranking(&ranking, self.hit_threshold);

        Ok(AggregateReport {
            rows,
            ranking,
            combined_artifact_path: None,
            hits,
        })
    }

    /// Collect, then write `summary_results.csv`, `top_<K>_hits.txt` and the
    /// combined best-pose file.
    pub async fn aggregate<'a, I>(&self, completed: I) -> Result<AggregateReport>
    where
        I: IntoIterator<Item = &'a TaskId>,
    {
        let mut report = self.collect(completed).await?;

        write_summary_csv(&self.layout.summary_csv(), &report.rows)?;
        write_top_hits(
            &self.layout.top_hits_summary(self.top_k),
            &report.ranking,
            self.top_k,
            &report.hits,
        )
        .await?;

        if report.is_empty() {
            info!("No results");
            return Ok(report);
        }

        report.combined_artifact_path = self.combine_best_poses(&report.ranking).await;
        info!(
            tasks = report.ranking.len(),
            rows = report.rows.len(),
            hits = report.hits.hits,
            "Aggregation complete"
        );
        Ok(report)
    }

    async fn combine_best_poses(&self, ranking: &[RankedTask]) -> Option<PathBuf> {
        let mut inputs = Vec::with_capacity(ranking.len());
        for r in ranking {
            let complex = self.layout.complex(&r.task_id, r.best_mode);
            if tokio::fs::metadata(&complex).await.is_ok() {
                inputs.push(complex);
            } else {
                warn!(task_id = %r.task_id, "Best-pose complex {:?} is missing", complex);
            }
        }
        if inputs.is_empty() {
            return None;
        }

        let output = self.layout.combined_hits();
        match self.converter.combine(&inputs, &output).await {
            Ok(()) => {
                debug!("Combined {} complexes into {:?}", inputs.len(), output);
                Some(output)
            }
            Err(e) => {
                warn!("Could not combine best poses: {}", e);
                None
            }
        }
    }
}
