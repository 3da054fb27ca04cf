#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferrodock_common::{BoxGeometry, CompletionRule, ConfigFile, PipelineConfig, RunLayout, TaskSet};
use ferrodock_molecules::pipeline::{prepare_target, TaskPipeline};
use ferrodock_molecules::{DockingEngine, FormatConverter, PoseSplitter};
use ferrodock_ranker::{AggregateReport, ResultAggregator};
use ferrodock_runtime::{discover_items, BatchOutcome, CheckpointStore, JobLedger, WorkerPool};
use ferrodock_test_utils::{ligand_tree, write_receptor, FakeConverter, FakeEngine, FakeSplitter};
use tempfile::TempDir;

/// Input tree, receptor and output root inside one temp dir. Survives
/// several batches so resume behaviour can be exercised.
pub struct Workspace {
    pub dir: TempDir,
    pub input_root: PathBuf,
    pub receptor: PathBuf,
    pub layout: RunLayout,
}

impl Workspace {
    pub fn new(items: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_root = dir.path().join("input");
        std::fs::create_dir_all(&input_root).unwrap();
        ligand_tree(&input_root, items);
        let receptor = write_receptor(dir.path());
        let layout = RunLayout::new(dir.path().join("run"));
        Self {
            dir,
            input_root,
            receptor,
            layout,
        }
    }

    pub fn item(&self, rel: &str) -> PathBuf {
        self.input_root.join(rel)
    }
}

pub struct Adapters {
    pub converter: Arc<FakeConverter>,
    pub engine: Arc<FakeEngine>,
    pub splitter: Arc<FakeSplitter>,
}

impl Adapters {
    pub fn new(converter: FakeConverter, engine: FakeEngine) -> Self {
        Self {
            converter: Arc::new(converter),
            engine: Arc::new(engine),
            splitter: Arc::new(FakeSplitter::new()),
        }
    }
}

impl Default for Adapters {
    fn default() -> Self {
        Self::new(FakeConverter::new(), FakeEngine::new())
    }
}

pub fn config(concurrency: usize, rule: CompletionRule) -> PipelineConfig {
    let mut config = PipelineConfig::from_file(
        &ConfigFile::default(),
        BoxGeometry::new([5.0, 5.0, 5.0], [14.0, 14.0, 14.0]),
        8000,
    );
    config.concurrency = concurrency;
    config.completion_rule = rule;
    config
}

/// Enumerate, dispatch and aggregate one batch.
pub async fn run_batch(ws: &Workspace, config: PipelineConfig, adapters: &Adapters) -> (BatchOutcome, AggregateReport) {
    let converter: Arc<dyn FormatConverter> = adapters.converter.clone();
    let engine: Arc<dyn DockingEngine> = adapters.engine.clone();
    let splitter: Arc<dyn PoseSplitter> = adapters.splitter.clone();
    run_with(ws, config, converter, engine, splitter).await
}

pub async fn run_with(
    ws: &Workspace,
    config: PipelineConfig,
    converter: Arc<dyn FormatConverter>,
    engine: Arc<dyn DockingEngine>,
    splitter: Arc<dyn PoseSplitter>,
) -> (BatchOutcome, AggregateReport) {
    let tasks = discover(ws);
    run_tasks(ws, config, tasks, converter, engine, splitter).await
}

pub fn discover(ws: &Workspace) -> TaskSet {
    TaskSet::from_paths(&ws.input_root, discover_items(&ws.input_root).unwrap()).unwrap()
}

/// Dispatch and aggregate an already built task set.
pub async fn run_tasks(
    ws: &Workspace,
    config: PipelineConfig,
    tasks: TaskSet,
    converter: Arc<dyn FormatConverter>,
    engine: Arc<dyn DockingEngine>,
    splitter: Arc<dyn PoseSplitter>,
) -> (BatchOutcome, AggregateReport) {
    config.validate().unwrap();
    let target = prepare_target(&ws.receptor, &ws.layout, converter.as_ref()).await.unwrap();

    let rule = config.completion_rule;
    let (top_k, threshold) = (config.top_k, config.hit_threshold);
    let pipeline = Arc::new(TaskPipeline::new(
        Arc::new(config),
        ws.layout.clone(),
        target,
        Arc::clone(&converter),
        engine,
        splitter,
    ));
    let checkpoints = Arc::new(CheckpointStore::new(ws.layout.clone(), rule));
    let ledger = Arc::new(JobLedger::open(ws.layout.ledger()).unwrap());

    let pool = WorkerPool::new(pipeline, checkpoints, ledger).unwrap();
    let outcome = pool.run(tasks).await.unwrap();

    let aggregator = ResultAggregator::new(ws.layout.clone(), converter, top_k, threshold);
    let report = aggregator
        .aggregate(outcome.completed().map(|t| &t.id))
        .await
        .unwrap();
    (outcome, report)
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
