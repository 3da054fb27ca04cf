//! On-disk layout of a run's output directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::task::TaskId;

pub const RESULTS_DIR: &str = "results";
pub const LIGANDS_DIR: &str = "ligands";
pub const POSES_DIR: &str = "poses";
pub const SCRATCH_DIR: &str = ".work";
pub const LOG_FILE: &str = "log.txt";
pub const DONE_MARKER: &str = ".done";

#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<base>/docking_<YYYYMMDD_HHMMSS>`.
    pub fn timestamped(base: &Path, now: DateTime<Local>) -> Self {
        Self::new(base.join(format!("docking_{}", now.format("%Y%m%d_%H%M%S"))))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn receptor_pdbqt(&self) -> PathBuf {
        self.root.join("receptor.pdbqt")
    }

    pub fn receptor_pdb(&self) -> PathBuf {
        self.root.join("receptor.pdb")
    }

    pub fn ligands_dir(&self) -> PathBuf {
        self.root.join(LIGANDS_DIR)
    }

    pub fn prepared_ligand(&self, id: &TaskId) -> PathBuf {
        self.ligands_dir().join(format!("{id}.pdbqt"))
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    pub fn task_dir(&self, id: &TaskId) -> PathBuf {
        self.results_dir().join(id.as_str())
    }

    pub fn task_log(&self, id: &TaskId) -> PathBuf {
        self.task_dir(id).join(LOG_FILE)
    }

    pub fn poses_dir(&self, id: &TaskId) -> PathBuf {
        self.task_dir(id).join(POSES_DIR)
    }

    /// Complex file for pose `rank` (1-based).
    pub fn complex(&self, id: &TaskId, rank: u32) -> PathBuf {
        self.poses_dir(id).join(complex_file_name(rank))
    }

    pub fn scratch_dir(&self, id: &TaskId) -> PathBuf {
        self.task_dir(id).join(SCRATCH_DIR)
    }

    pub fn done_marker(&self, id: &TaskId) -> PathBuf {
        self.task_dir(id).join(DONE_MARKER)
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join("jobs.log")
    }

    pub fn summary_csv(&self) -> PathBuf {
        self.root.join("summary_results.csv")
    }

    pub fn combined_hits(&self) -> PathBuf {
        self.root.join("top_hits_complexes.pdb")
    }

    pub fn top_hits_summary(&self, k: usize) -> PathBuf {
        self.root.join(format!("top_{k}_hits.txt"))
    }
}

pub fn complex_file_name(rank: u32) -> String {
    format!("complex_{rank}.pdb")
}
