//! Bounded worker pool.
//!
//! At most `concurrency` pipelines run at once. Checkpointed tasks are
//! skipped before they take a slot. Every spawned task is awaited before
//! [`WorkerPool::run`] returns, and a panic inside one pipeline marks only
//! that task Failed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use ferrodock_common::{FerrodockError, Result, Task, TaskId, TaskSet, TaskState};
use ferrodock_molecules::pipeline::{PipelineStep, TaskFailure, TaskPipeline};
use glob::{MatchOptions, Pattern};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::checkpoint::{source_digest, CheckpointStore};
use crate::ledger::{JobLedger, JobLedgerEntry, LedgerSummary};

/// Item extensions picked up from the input root.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["sdf", "mol2", "mol", "pdb", "pdbqt", "smi"];

/// Every supported item below `root`, recursively, sorted.
pub fn discover_items(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(FerrodockError::MissingInput(root.to_path_buf()));
    }
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let base = Pattern::escape(&root.to_string_lossy());

    let mut items = Vec::new();
    for ext in SUPPORTED_EXTENSIONS {
        let pattern = format!("{base}/**/*.{ext}");
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| FerrodockError::Config(format!("bad search pattern {pattern}: {e}")))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => items.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
    }
    items.sort();
    items.dedup();
    Ok(items)
}

/// Final state of a batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Every task of the set, sorted by id.
    pub tasks: Vec<Task>,
    pub summary: LedgerSummary,
}

impl BatchOutcome {
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// Tasks whose artifacts are complete: run now, or skipped by checkpoint.
    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Success | TaskState::Skipped))
    }
}

pub struct WorkerPool {
    pipeline: Arc<TaskPipeline>,
    checkpoints: Arc<CheckpointStore>,
    ledger: Arc<JobLedger>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<TaskPipeline>,
        checkpoints: Arc<CheckpointStore>,
        ledger: Arc<JobLedger>,
    ) -> Result<Self> {
        let concurrency = pipeline.config().concurrency;
        if concurrency == 0 {
            return Err(FerrodockError::Config("concurrency must be at least 1".into()));
        }
        Ok(Self {
            pipeline,
            checkpoints,
            ledger,
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every incomplete task of `tasks` and wait for all of them.
    pub async fn run(&self, tasks: TaskSet) -> Result<BatchOutcome> {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let mut finished: Vec<Task> = Vec::with_capacity(total);
        // Dispatched tasks not yet joined.
        let mut in_flight: BTreeMap<TaskId, Task> = BTreeMap::new();

        info!(tasks = total, concurrency = self.concurrency, "Dispatching batch");

        for mut task in tasks.into_tasks() {
            let digest = match source_digest(&task.source_path).await {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(task_id = %task.id, "Could not hash source: {}", e);
                    None
                }
            };

            // Without a digest the marker alone decides.
            if self.checkpoints.is_complete(&task.id, digest.as_deref()).await {
                info!(task_id = %task.id, "Checkpoint found, skipping");
                task.state = TaskState::Skipped;
                finished.push(task);
                continue;
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| FerrodockError::Scheduler(e.to_string()))?;

            let pipeline = Arc::clone(&self.pipeline);
            let checkpoints = Arc::clone(&self.checkpoints);
            let ledger = Arc::clone(&self.ledger);

            in_flight.insert(task.id.clone(), task.clone());
            join_set.spawn(async move {
                let task = execute(task, digest, pipeline, checkpoints, ledger).await;
                drop(permit);
                task
            });

            // Reap finished tasks.
            while let Some(joined) = join_set.try_join_next() {
                collect(joined, &mut in_flight, &mut finished);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            collect(joined, &mut in_flight, &mut finished);
        }
        for task in in_flight.into_values() {
            finished.push(abandon(task, &self.ledger));
        }

        finished.sort_by(|a, b| a.id.cmp(&b.id));
        let summary = self.ledger.summarize()?;
        info!(
            dispatched = summary.dispatched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = finished.iter().filter(|t| t.state == TaskState::Skipped).count(),
            "Batch complete"
        );

        Ok(BatchOutcome {
            tasks: finished,
            summary,
        })
    }
}

fn collect(
    joined: std::result::Result<Task, tokio::task::JoinError>,
    in_flight: &mut BTreeMap<TaskId, Task>,
    finished: &mut Vec<Task>,
) {
    match joined {
        Ok(task) => {
            in_flight.remove(&task.id);
            finished.push(task);
        }
        // The task stays in `in_flight` and is abandoned after the barrier.
        Err(e) => error!("Worker task aborted: {}", e),
    }
}

/// Record a task whose worker died before it could report.
fn abandon(mut task: Task, ledger: &JobLedger) -> Task {
    warn!(task_id = %task.id, "Worker lost, marking task failed");
    task.state = TaskState::Failed;
    let now = Utc::now();
    let entry = JobLedgerEntry {
        task_id: task.id.clone(),
        exit_status: 1,
        start_time: now,
        end_time: now,
        step: Some(PipelineStep::Aborted.to_string()),
        error: Some("worker task aborted".into()),
    };
    if let Err(e) = ledger.append(entry) {
        error!("Could not append ledger entry: {}", e);
    }
    task
}

/// Reserve, run the pipeline, commit, and record the outcome in the ledger.
#[instrument(skip_all, fields(task_id = %task.id))]
async fn execute(
    mut task: Task,
    digest: Option<String>,
    pipeline: Arc<TaskPipeline>,
    checkpoints: Arc<CheckpointStore>,
    ledger: Arc<JobLedger>,
) -> Task {
    task.state = TaskState::Running;
    let start_time = Utc::now();

    let outcome = run_guarded(&task, digest.as_deref(), pipeline, &checkpoints).await;
    let end_time = Utc::now();

    let (exit_status, step, error) = match &outcome {
        Ok(()) => {
            task.state = TaskState::Success;
            info!("Task succeeded");
            (0, None, None)
        }
        Err(failure) => {
            task.state = TaskState::Failed;
            warn!(step = %failure.step, "Task failed: {}", failure.error);
            (1, Some(failure.step.to_string()), Some(failure.error.to_string()))
        }
    };

    let entry = JobLedgerEntry {
        task_id: task.id.clone(),
        exit_status,
        start_time,
        end_time,
        step,
        error,
    };
    if let Err(e) = ledger.append(entry) {
        error!("Could not append ledger entry: {}", e);
    }
    task
}

async fn run_guarded(
    task: &Task,
    digest: Option<&str>,
    pipeline: Arc<TaskPipeline>,
    checkpoints: &CheckpointStore,
) -> std::result::Result<(), TaskFailure> {
    checkpoints
        .clear(&task.id)
        .await
        .map_err(TaskFailure::at(PipelineStep::Reserve))?;
    checkpoints
        .reserve(&task.id)
        .await
        .map_err(TaskFailure::at(PipelineStep::Reserve))?;

    // The pipeline runs in its own task so a panic surfaces as a JoinError
    // here instead of taking the worker down with it.
    let owned = task.clone();
    let handle = tokio::spawn(async move { pipeline.run(&owned).await });
    match handle.await {
        Ok(Ok(_report)) => {}
        Ok(Err(failure)) => return Err(failure),
        Err(e) => {
            return Err(TaskFailure {
                step: PipelineStep::Aborted,
                error: FerrodockError::Scheduler(format!("pipeline panicked: {e}")),
            })
        }
    }

    let digest = match digest {
        Some(d) => d.to_string(),
        None => source_digest(&task.source_path)
            .await
            .map_err(TaskFailure::at(PipelineStep::Commit))?,
    };
    checkpoints
        .mark_complete(&task.id, &digest)
        .await
        .map_err(TaskFailure::at(PipelineStep::Commit))
}
