//! Scripted adapters that write plausible files without external tools.
//!
//! Items are matched by the file stem of the path handed to the adapter. The
//! converter sees source items (`set_a/lig1.sdf` is `lig1`); the engine sees
//! prepared ligands, whose stem is the task id (`set_a_lig1`).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ferrodock_common::{FerrodockError, PipelineConfig, Result};
use ferrodock_molecules::{
    ConversionRequest, DockingEngine, DockingOutput, DockingRequest, FormatConverter, PoseSplitter,
    StructureRole,
};

use crate::fixtures::{pdb_atoms, vina_log};

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ── Converter ─────────────────────────────────────────────────────────────────

/// Copies inputs to outputs. Ligand conversions of stems in `fail_on` fail.
#[derive(Default)]
pub struct FakeConverter {
    fail_on: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on<I, S>(stems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail_on: stems.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FormatConverter for FakeConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.role == StructureRole::Ligand && self.fail_on.contains(&stem(&request.input)) {
            return Err(FerrodockError::Conversion(format!(
                "{}: scripted failure",
                request.input.display()
            )));
        }
        let text = tokio::fs::read_to_string(&request.input).await?;
        tokio::fs::write(&request.output, text).await?;
        Ok(())
    }

    async fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut combined = String::new();
        for input in inputs {
            combined.push_str(&tokio::fs::read_to_string(input).await?);
        }
        tokio::fs::write(output, combined).await?;
        Ok(())
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Mode rows `(mode, affinity, rmsd_lb, rmsd_ub)` the fake engine reports.
pub type ModeTable = Vec<(u32, f64, f64, f64)>;

/// Writes one MODEL block per scripted mode and returns a Vina-style log.
pub struct FakeEngine {
    tables: HashMap<String, ModeTable>,
    default_table: ModeTable,
    fail_on: HashSet<String>,
    panic_on: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            default_table: vec![(1, -7.0, 0.0, 0.0), (2, -6.5, 1.2, 2.0)],
            fail_on: HashSet::new(),
            panic_on: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `table` for the ligand with this stem.
    pub fn with_table(mut self, stem: &str, table: ModeTable) -> Self {
        self.tables.insert(stem.to_string(), table);
        self
    }

    pub fn failing_on(mut self, stem: &str) -> Self {
        self.fail_on.insert(stem.to_string());
        self
    }

    /// Panic instead of answering, as a crashing adapter would.
    pub fn panicking_on(mut self, stem: &str) -> Self {
        self.panic_on.insert(stem.to_string());
        self
    }

    /// Sleep before answering, so concurrent runs interleave.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DockingEngine for FakeEngine {
    async fn dock(&self, request: &DockingRequest, _config: &PipelineConfig) -> Result<DockingOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let ligand = stem(&request.ligand);
        if self.panic_on.contains(&ligand) {
            panic!("{ligand}: scripted panic");
        }
        if self.fail_on.contains(&ligand) {
            return Err(FerrodockError::Engine(format!("{ligand}: scripted failure")));
        }

        let table = self.tables.get(&ligand).unwrap_or(&self.default_table);
        let mut result = String::new();
        for (mode, _, _, _) in table {
            result.push_str(&format!("MODEL {mode}\n"));
            result.push_str(&pdb_atoms(&[[*mode as f64, 0.0, 0.0]]).replace("ATOM  ", "HETATM"));
            result.push_str("ENDMDL\n");
        }
        tokio::fs::write(&request.out, result).await?;

        Ok(DockingOutput {
            result: request.out.clone(),
            log: vina_log(table),
        })
    }
}

// ── Splitter ──────────────────────────────────────────────────────────────────

/// Splits on MODEL / ENDMDL blocks into `pose_<n>.pdbqt`.
#[derive(Default)]
pub struct FakeSplitter {
    calls: AtomicUsize,
}

impl FakeSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoseSplitter for FakeSplitter {
    async fn split(&self, result: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(out_dir).await?;
        let text = tokio::fs::read_to_string(result).await?;

        let mut poses = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            if line.starts_with("ENDMDL") {
                let path = out_dir.join(format!("pose_{}.pdbqt", poses.len() + 1));
                tokio::fs::write(&path, &current).await?;
                poses.push(path);
                current.clear();
            } else if !line.starts_with("MODEL") {
                current.push_str(line);
                current.push('\n');
            }
        }
        if poses.is_empty() {
            return Err(FerrodockError::Split(format!("{}: no models", result.display())));
        }
        Ok(poses)
    }
}
