//! Per-task docking pipeline.
//!
//! Each task runs, in order:
//!   1. Convert the source item to an engine-ready PDBQT ligand
//!   2. Dock it against the prepared receptor (raw result and log go to scratch)
//!   3. Split the multi-pose result into one file per pose
//!   4. Build one receptor–pose complex per pose, numbered by pose rank
//!   5. Promote the log and complexes into the task directory and delete scratch
//!
//! A failing step stops that task only and is reported as a [`TaskFailure`].
//! Nothing from scratch is promoted unless every step succeeded.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferrodock_common::layout::complex_file_name;
use ferrodock_common::{FerrodockError, PipelineConfig, Result, RunLayout, Task};
use tracing::{debug, info, instrument, warn};

use crate::complex::write_complex;
use crate::convert::{ConversionRequest, FormatConverter, StructureRole};
use crate::docking::{DockingEngine, DockingRequest};
use crate::split::PoseSplitter;

// ── Target preparation ────────────────────────────────────────────────────────

/// Receptor files shared by every task of a run.
#[derive(Debug, Clone)]
pub struct PreparedTarget {
    pub pdbqt: PathBuf,
    pub pdb_text: Arc<str>,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Write `receptor.pdbqt` (for docking) and `receptor.pdb` (for complexes)
/// into the run root.
pub async fn prepare_target(
    target: &Path,
    layout: &RunLayout,
    converter: &dyn FormatConverter,
) -> Result<PreparedTarget> {
    if !target.is_file() {
        return Err(FerrodockError::MissingInput(target.to_path_buf()));
    }
    tokio::fs::create_dir_all(layout.root()).await?;

    let pdbqt = layout.receptor_pdbqt();
    if has_extension(target, "pdbqt") {
        tokio::fs::copy(target, &pdbqt).await?;
    } else {
        converter
            .convert(&ConversionRequest::new(target, &pdbqt, StructureRole::Receptor))
            .await?;
    }

    let pdb = layout.receptor_pdb();
    if has_extension(target, "pdb") {
        tokio::fs::copy(target, &pdb).await?;
    } else {
        converter
            .convert(&ConversionRequest::new(target, &pdb, StructureRole::Pose))
            .await?;
    }

    let pdb_text: Arc<str> = tokio::fs::read_to_string(&pdb).await?.into();
    info!("Target prepared: {:?}", pdbqt);
    Ok(PreparedTarget { pdbqt, pdb_text })
}

// ── Failure reporting ─────────────────────────────────────────────────────────

/// Where a task failed. `Reserve`, `Commit` and `Aborted` (the pipeline
/// panicked) are recorded by the scheduler around the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Reserve,
    Convert,
    Dock,
    Split,
    BuildComplex,
    Cleanup,
    Commit,
    Aborted,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Reserve => "reserve",
            PipelineStep::Convert => "convert",
            PipelineStep::Dock => "dock",
            PipelineStep::Split => "split",
            PipelineStep::BuildComplex => "build_complex",
            PipelineStep::Cleanup => "cleanup",
            PipelineStep::Commit => "commit",
            PipelineStep::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct TaskFailure {
    pub step: PipelineStep,
    pub error: FerrodockError,
}

impl TaskFailure {
    pub fn at(step: PipelineStep) -> impl FnOnce(FerrodockError) -> TaskFailure {
        move |error| TaskFailure { step, error }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed: {}", self.step, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub poses: u32,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

pub struct TaskPipeline {
    config: Arc<PipelineConfig>,
    layout: RunLayout,
    target: PreparedTarget,
    converter: Arc<dyn FormatConverter>,
    engine: Arc<dyn DockingEngine>,
    splitter: Arc<dyn PoseSplitter>,
}

impl TaskPipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        layout: RunLayout,
        target: PreparedTarget,
        converter: Arc<dyn FormatConverter>,
        engine: Arc<dyn DockingEngine>,
        splitter: Arc<dyn PoseSplitter>,
    ) -> Self {
        Self {
            config,
            layout,
            target,
            converter,
            engine,
            splitter,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn converter(&self) -> Arc<dyn FormatConverter> {
        Arc::clone(&self.converter)
    }

    /// Run every step for `task`. The task directory must already exist.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn run(&self, task: &Task) -> std::result::Result<PipelineReport, TaskFailure> {
        let scratch = self.layout.scratch_dir(&task.id);
        let outcome = self.run_steps(task, &scratch).await;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not remove scratch {:?}: {}", scratch, e);
                if outcome.is_ok() {
                    return Err(TaskFailure::at(PipelineStep::Cleanup)(e.into()));
                }
            }
        }
        outcome
    }

    async fn run_steps(&self, task: &Task, scratch: &Path) -> std::result::Result<PipelineReport, TaskFailure> {
        let id = &task.id;
        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|e| TaskFailure::at(PipelineStep::Convert)(e.into()))?;

        // 1. Convert
        let ligand = self.layout.prepared_ligand(id);
        if let Some(parent) = ligand.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskFailure::at(PipelineStep::Convert)(e.into()))?;
        }
        self.converter
            .convert(&ConversionRequest::new(&task.source_path, &ligand, StructureRole::Ligand))
            .await
            .map_err(TaskFailure::at(PipelineStep::Convert))?;
        debug!("Ligand prepared: {:?}", ligand);

        // 2. Dock
        let request = DockingRequest {
            receptor: self.target.pdbqt.clone(),
            ligand,
            out: scratch.join("out.pdbqt"),
        };
        let docked = self
            .engine
            .dock(&request, &self.config)
            .await
            .map_err(TaskFailure::at(PipelineStep::Dock))?;
        let scratch_log = scratch.join("log.txt");
        tokio::fs::write(&scratch_log, &docked.log)
            .await
            .map_err(|e| TaskFailure::at(PipelineStep::Dock)(e.into()))?;

        // 3. Split
        let poses = self
            .splitter
            .split(&docked.result, &scratch.join("split"))
            .await
            .map_err(TaskFailure::at(PipelineStep::Split))?;

        // 4. Build complexes
        let complexes = scratch.join("complexes");
        let pose_pdbs = scratch.join("pose_pdb");
        for dir in [&complexes, &pose_pdbs] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TaskFailure::at(PipelineStep::BuildComplex)(e.into()))?;
        }
        for (index, pose) in poses.iter().enumerate() {
            let rank = index as u32 + 1;
            let pose_pdb = pose_pdbs.join(format!("pose_{rank}.pdb"));
            self.converter
                .convert(&ConversionRequest::new(pose, &pose_pdb, StructureRole::Pose))
                .await
                .map_err(TaskFailure::at(PipelineStep::BuildComplex))?;
            write_complex(&self.target.pdb_text, &pose_pdb, &complexes.join(complex_file_name(rank)))
                .await
                .map_err(TaskFailure::at(PipelineStep::BuildComplex))?;
        }

        // 5. Promote
        self.promote(id, &scratch_log, &complexes)
            .await
            .map_err(TaskFailure::at(PipelineStep::Cleanup))?;

        let report = PipelineReport { poses: poses.len() as u32 };
        info!(poses = report.poses, "Task pipeline complete");
        Ok(report)
    }

    async fn promote(&self, id: &ferrodock_common::TaskId, log: &Path, complexes: &Path) -> Result<()> {
        let poses_dir = self.layout.poses_dir(id);
        if tokio::fs::metadata(&poses_dir).await.is_ok() {
            tokio::fs::remove_dir_all(&poses_dir).await?;
        }
        tokio::fs::rename(complexes, &poses_dir).await?;
        tokio::fs::rename(log, self.layout.task_log(id)).await?;
        Ok(())
    }
}
