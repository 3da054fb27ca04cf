//! `ferrodock run`: enumerate, dock, aggregate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use ferrodock_common::config::EngineMode;
use ferrodock_common::{FerrodockError, PipelineConfig, RunLayout, TaskSet};
use ferrodock_molecules::gpu::{resolve_gpu_threads, NvidiaSmiProbe};
use ferrodock_molecules::pipeline::{prepare_target, TaskPipeline};
use ferrodock_molecules::process::ensure_dependencies;
use ferrodock_molecules::{FormatConverter, OpenBabelConverter, VinaRunner, VinaSplitRunner};
use ferrodock_ranker::{AggregateReport, ResultAggregator};
use ferrodock_runtime::{discover_items, BatchOutcome, CheckpointStore, JobLedger, WorkerPool};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::config;

pub async fn execute(args: RunArgs) -> Result<()> {
    let mut file = config::load(&args).context("loading configuration")?;
    config::apply_overrides(&mut file, &args)?;

    // Fatal checks, all before anything is dispatched.
    if !args.target.is_file() {
        return Err(FerrodockError::MissingInput(args.target.clone()).into());
    }
    if !args.ligands.is_dir() {
        return Err(FerrodockError::MissingInput(args.ligands.clone()).into());
    }
    let mode = file.docking.mode;
    file.tools = ensure_dependencies(&file.tools, mode)?;

    let items = discover_items(&args.ligands)?;
    let tasks = TaskSet::from_paths(&args.ligands, items)?;
    if tasks.is_empty() {
        warn!("No ligands found under {}", args.ligands.display());
    }

    let gpu_threads = match mode {
        EngineMode::Gpu => resolve_gpu_threads(&file.gpu, &NvidiaSmiProbe::new(&file.tools.nvidia_smi)).await,
        EngineMode::Cpu => 0,
    };
    let geometry = config::resolve_geometry(&file, &args.target)
        .await
        .context("resolving the search box")?;
    let pipeline_config = PipelineConfig::from_file(&file, geometry, gpu_threads);
    pipeline_config.validate()?;

    let layout = match &args.output_dir {
        Some(dir) => RunLayout::new(dir),
        None => RunLayout::timestamped(&file.docking.output_base, Local::now()),
    };
    info!(
        output = %layout.root().display(),
        tasks = tasks.len(),
        mode = ?mode,
        center = ?pipeline_config.geometry.center,
        size = ?pipeline_config.geometry.size,
        "Starting docking run"
    );

    let converter: Arc<dyn FormatConverter> = Arc::new(OpenBabelConverter::new(
        &pipeline_config.tools.obabel,
        pipeline_config.timeouts.convert(),
    ));
    let splitter = Arc::new(VinaSplitRunner::new(
        &pipeline_config.tools.vina_split,
        pipeline_config.timeouts.split(),
    ));

    let target = prepare_target(&args.target, &layout, converter.as_ref())
        .await
        .with_context(|| format!("preparing target {}", args.target.display()))?;

    let rule = pipeline_config.completion_rule;
    let (top_k, hit_threshold) = (pipeline_config.top_k, pipeline_config.hit_threshold);
    let pipeline = Arc::new(TaskPipeline::new(
        Arc::new(pipeline_config),
        layout.clone(),
        target,
        Arc::clone(&converter),
        Arc::new(VinaRunner::new()),
        splitter,
    ));
    let checkpoints = Arc::new(CheckpointStore::new(layout.clone(), rule));
    let ledger = Arc::new(JobLedger::open(layout.ledger()).context("opening job ledger")?);

    let pool = WorkerPool::new(pipeline, checkpoints, ledger)?;
    let outcome = pool.run(tasks).await?;

    let aggregator = ResultAggregator::new(layout.clone(), converter, top_k, hit_threshold);
    let report = aggregator
        .aggregate(outcome.completed().map(|t| &t.id))
        .await
        .context("aggregating results")?;

    print_summary(layout.root().to_path_buf(), &outcome, &report, top_k);
    Ok(())
}

fn print_summary(root: PathBuf, outcome: &BatchOutcome, report: &AggregateReport, top_k: usize) {
    use ferrodock_common::TaskState;

    println!("Output: {}", root.display());
    println!(
        "Succeeded: {}  Failed: {}  Skipped (already complete): {}",
        outcome.summary.succeeded,
        outcome.summary.failed,
        outcome.count(TaskState::Skipped)
    );
    if !outcome.summary.failed_ids.is_empty() {
        let ids: Vec<&str> = outcome.summary.failed_ids.iter().map(|id| id.as_str()).collect();
        println!("Failed: {}", ids.join(", "));
    }

    if report.is_empty() {
        println!("No results.");
        return;
    }
    println!(
        "Hits (<= {:.1} kcal/mol): {}/{} ({:.1}%)",
        report.hits.threshold, report.hits.hits, report.hits.total, report.hits.hit_rate
    );
    for (rank, hit) in report.top(top_k).iter().enumerate() {
        println!("  {:>2}. {:<24} {:>8.3}", rank + 1, hit.task_id.as_str(), hit.best_affinity);
    }
}
