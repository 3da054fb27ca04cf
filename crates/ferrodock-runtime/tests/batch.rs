mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, discover, read, run_batch, run_tasks, Adapters, Workspace};
use ferrodock_common::{CompletionRule, FerrodockError, TaskId, TaskSet, TaskState};
use ferrodock_runtime::ledger::read_ledger;
use ferrodock_molecules::{DockingEngine, FormatConverter, PoseSplitter};
use ferrodock_runtime::discover_items;
use ferrodock_test_utils::{FakeConverter, FakeEngine};
use pretty_assertions::assert_eq;

fn state_of(outcome: &ferrodock_runtime::BatchOutcome, id: &str) -> TaskState {
    outcome
        .tasks
        .iter()
        .find(|t| t.id.as_str() == id)
        .map(|t| t.state)
        .unwrap()
}

#[tokio::test]
async fn test_synthetic_log_yields_two_rows() {
    let ws = Workspace::new(&["T.sdf"]);
    let engine = FakeEngine::new().with_table("T", vec![(1, -8.50, 0.0, 0.0), (2, -7.20, 1.1, 2.3)]);
    let adapters = Adapters::new(FakeConverter::new(), engine);

    let (outcome, report) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;

    assert_eq!(state_of(&outcome, "T"), TaskState::Success);
    assert_eq!(report.rows.len(), 2);
    let fields: Vec<(u32, f64, f64, f64)> = report
        .rows
        .iter()
        .map(|r| (r.mode, r.affinity, r.rmsd_lb, r.rmsd_ub))
        .collect();
    assert_eq!(fields, vec![(1, -8.5, 0.0, 0.0), (2, -7.2, 1.1, 2.3)]);
    assert_eq!(report.ranking[0].best_affinity, -8.50);

    let id = TaskId::from("T");
    assert!(ws.layout.complex(&id, 1).exists());
    assert!(ws.layout.complex(&id, 2).exists());
    assert!(ws.layout.task_log(&id).exists());
    assert!(ws.layout.done_marker(&id).exists());
    assert!(!ws.layout.scratch_dir(&id).exists());
    assert!(ws.layout.combined_hits().exists());

    let complex = read(&ws.layout.complex(&id, 1));
    assert!(complex.contains("\nTER\n"));
    assert!(complex.ends_with("END\n"));
}

#[tokio::test]
async fn test_conversion_failure_isolated_to_its_task() {
    let ws = Workspace::new(&["a.sdf", "b.sdf", "c.sdf"]);
    let adapters = Adapters::new(FakeConverter::failing_on(["b"]), FakeEngine::new());

    let (outcome, report) = run_batch(&ws, config(3, CompletionRule::Marker), &adapters).await;

    assert_eq!(state_of(&outcome, "a"), TaskState::Success);
    assert_eq!(state_of(&outcome, "b"), TaskState::Failed);
    assert_eq!(state_of(&outcome, "c"), TaskState::Success);
    assert_eq!(outcome.summary.dispatched, 3);
    assert_eq!(outcome.summary.failed_ids, vec![TaskId::from("b")]);

    assert!(report.rows.iter().all(|r| r.task_id.as_str() != "b"));
    assert_eq!(report.ranking.len(), 2);
    assert!(!ws.layout.done_marker(&TaskId::from("b")).exists());

    let ledger = read_ledger(&ws.layout.ledger()).unwrap();
    let failed = ledger.iter().find(|e| e.task_id.as_str() == "b").unwrap();
    assert_eq!(failed.exit_status, 1);
    assert_eq!(failed.step.as_deref(), Some("convert"));
    assert!(failed.error.as_deref().unwrap().contains("scripted failure"));
}

#[tokio::test]
async fn test_engine_failure_promotes_nothing() {
    let ws = Workspace::new(&["good.sdf", "bad.sdf"]);
    let adapters = Adapters::new(FakeConverter::new(), FakeEngine::new().failing_on("bad"));

    let (outcome, _report) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;

    assert_eq!(state_of(&outcome, "bad"), TaskState::Failed);
    let bad = TaskId::from("bad");
    assert!(!ws.layout.task_log(&bad).exists());
    assert!(!ws.layout.poses_dir(&bad).exists());
    assert!(!ws.layout.scratch_dir(&bad).exists());
}

#[tokio::test]
async fn test_rerun_skips_every_checkpointed_task() {
    for rule in [CompletionRule::Marker, CompletionRule::NonEmptyDirectory] {
        let ws = Workspace::new(&["x.sdf", "set/y.mol2", "set/deep/z.smi"]);

        let first = Adapters::default();
        let (outcome, report) = run_batch(&ws, config(2, rule), &first).await;
        assert_eq!(outcome.count(TaskState::Success), 3);
        assert_eq!(first.engine.calls(), 3);

        let second = Adapters::default();
        let (resumed, resumed_report) = run_batch(&ws, config(2, rule), &second).await;
        assert_eq!(second.engine.calls(), 0, "{rule:?}");
        assert_eq!(resumed.count(TaskState::Skipped), 3);
        assert_eq!(resumed.summary.dispatched, 0);

        // Skipped tasks still make it into the report.
        assert_eq!(resumed_report.rows, report.rows);
        assert_eq!(resumed_report.ranking, report.ranking);
    }
}

#[tokio::test]
async fn test_marker_rule_redocks_partial_output() {
    let ws = Workspace::new(&["a.sdf", "b.sdf"]);
    let partial = TaskId::from("a");
    std::fs::create_dir_all(ws.layout.task_dir(&partial)).unwrap();
    std::fs::write(ws.layout.task_log(&partial), "truncated").unwrap();

    let adapters = Adapters::default();
    let (outcome, _) = run_batch(&ws, config(1, CompletionRule::Marker), &adapters).await;

    assert_eq!(adapters.engine.calls(), 2);
    assert_eq!(state_of(&outcome, "a"), TaskState::Success);
    assert!(read(&ws.layout.task_log(&partial)).contains("affinity"));
}

#[tokio::test]
async fn test_edited_item_is_docked_again() {
    let ws = Workspace::new(&["a.sdf", "b.sdf"]);
    run_batch(&ws, config(2, CompletionRule::Marker), &Adapters::default()).await;

    std::fs::write(ws.item("b.sdf"), "b edited\n$$$$\n").unwrap();
    let adapters = Adapters::default();
    let (outcome, _) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;

    assert_eq!(adapters.engine.calls(), 1);
    assert_eq!(state_of(&outcome, "a"), TaskState::Skipped);
    assert_eq!(state_of(&outcome, "b"), TaskState::Success);
}

#[tokio::test]
async fn test_failed_task_retried_on_rerun() {
    let ws = Workspace::new(&["a.sdf", "b.sdf"]);
    let flaky = Adapters::new(FakeConverter::failing_on(["a"]), FakeEngine::new());
    run_batch(&ws, config(2, CompletionRule::Marker), &flaky).await;

    let adapters = Adapters::default();
    let (outcome, report) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;
    assert_eq!(adapters.engine.calls(), 1);
    assert_eq!(state_of(&outcome, "a"), TaskState::Success);
    assert_eq!(report.ranking.len(), 2);

    // Both runs appended to the same ledger.
    assert_eq!(read_ledger(&ws.layout.ledger()).unwrap().len(), 3);
}

#[tokio::test]
async fn test_concurrency_does_not_change_results() {
    let items = ["p.sdf", "q.sdf", "r.sdf", "s.sdf", "t.sdf", "u.sdf"];
    let engine = || {
        FakeEngine::new()
            .with_delay(Duration::from_millis(10))
            .with_table("p", vec![(1, -6.1, 0.0, 0.0)])
            .with_table("q", vec![(1, -9.3, 0.0, 0.0), (2, -9.0, 1.0, 1.5)])
            .with_table("r", vec![(1, -7.7, 0.0, 0.0)])
            .with_table("s", vec![(1, -7.7, 0.0, 0.0), (2, -7.1, 0.4, 0.9)])
            .with_table("t", vec![])
            .with_table("u", vec![(1, -8.0, 0.0, 0.0)])
    };

    let serial_ws = Workspace::new(&items);
    let serial = Adapters::new(FakeConverter::new(), engine());
    let (serial_outcome, serial_report) = run_batch(&serial_ws, config(1, CompletionRule::Marker), &serial).await;

    let parallel_ws = Workspace::new(&items);
    let parallel = Adapters::new(FakeConverter::new(), engine());
    let (_, parallel_report) = run_batch(&parallel_ws, config(4, CompletionRule::Marker), &parallel).await;

    assert_eq!(serial_report.rows, parallel_report.rows);
    assert_eq!(serial_report.ranking, parallel_report.ranking);
    assert_eq!(
        read(&serial_ws.layout.summary_csv()),
        read(&parallel_ws.layout.summary_csv())
    );

    // No poses to split.
    assert_eq!(state_of(&serial_outcome, "t"), TaskState::Failed);

    let order: Vec<&str> = serial_report.ranking.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(order, vec!["q", "u", "r", "s", "p"]);
    assert_eq!(serial_report.hits.hits, 2);
}

#[tokio::test]
async fn test_panicking_engine_fails_only_its_task() {
    let ws = Workspace::new(&["boom.sdf", "ok.sdf", "other.sdf"]);
    let adapters = Adapters::new(FakeConverter::new(), FakeEngine::new().panicking_on("boom"));

    let (outcome, report) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;

    assert_eq!(outcome.tasks.len(), 3);
    assert_eq!(state_of(&outcome, "boom"), TaskState::Failed);
    assert_eq!(state_of(&outcome, "ok"), TaskState::Success);
    assert_eq!(state_of(&outcome, "other"), TaskState::Success);
    assert_eq!(report.ranking.len(), 2);
    assert!(!ws.layout.done_marker(&TaskId::from("boom")).exists());

    let ledger = read_ledger(&ws.layout.ledger()).unwrap();
    let boom = ledger.iter().find(|e| e.task_id.as_str() == "boom").unwrap();
    assert_eq!(boom.exit_status, 1);
    assert_eq!(boom.step.as_deref(), Some("aborted"));
}

#[tokio::test]
async fn test_split_failure_isolated_to_its_task() {
    let ws = Workspace::new(&["empty.sdf", "full.sdf"]);
    let engine = FakeEngine::new().with_table("empty", vec![]);
    let adapters = Adapters::new(FakeConverter::new(), engine);

    let (outcome, report) = run_batch(&ws, config(2, CompletionRule::Marker), &adapters).await;

    assert_eq!(state_of(&outcome, "empty"), TaskState::Failed);
    assert_eq!(state_of(&outcome, "full"), TaskState::Success);
    assert!(report.rows.iter().all(|r| r.task_id.as_str() == "full"));

    let ledger = read_ledger(&ws.layout.ledger()).unwrap();
    let empty = ledger.iter().find(|e| e.task_id.as_str() == "empty").unwrap();
    assert_eq!(empty.step.as_deref(), Some("split"));
    assert!(!ws.layout.poses_dir(&TaskId::from("empty")).exists());
}

#[tokio::test]
async fn test_unreadable_source_keeps_completed_result() {
    let ws = Workspace::new(&["a.sdf", "b.sdf"]);
    run_batch(&ws, config(2, CompletionRule::Marker), &Adapters::default()).await;

    // The item disappears between enumeration and dispatch.
    let tasks = discover(&ws);
    std::fs::remove_file(ws.item("b.sdf")).unwrap();

    let adapters = Adapters::default();
    let converter: Arc<dyn FormatConverter> = adapters.converter.clone();
    let engine: Arc<dyn DockingEngine> = adapters.engine.clone();
    let splitter: Arc<dyn PoseSplitter> = adapters.splitter.clone();
    let (outcome, report) =
        run_tasks(&ws, config(2, CompletionRule::Marker), tasks, converter, engine, splitter).await;

    assert_eq!(adapters.engine.calls(), 0);
    assert_eq!(state_of(&outcome, "b"), TaskState::Skipped);
    let b = TaskId::from("b");
    assert!(ws.layout.done_marker(&b).exists());
    assert!(ws.layout.task_log(&b).exists());
    assert!(ws.layout.complex(&b, 1).exists());
    assert_eq!(report.ranking.len(), 2);
}

#[test]
fn test_flattening_collision_rejected_before_dispatch() {
    let ws = Workspace::new(&["a/b.sdf", "a_b.sdf"]);
    let items = discover_items(&ws.input_root).unwrap();
    let err = TaskSet::from_paths(&ws.input_root, items).unwrap_err();

    assert!(err.is_fatal());
    match err {
        FerrodockError::IdCollision { id, first, second } => {
            assert_eq!(id, "a_b");
            assert_ne!(first, second);
        }
        other => panic!("expected IdCollision, got {other:?}"),
    }
}
