//! Splitting multi-pose docking results with `vina_split`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ferrodock_common::{FerrodockError, Result};
use tokio::process::Command;
use tracing::debug;

use crate::process::{run_with_timeout, stderr_tail};

#[async_trait]
pub trait PoseSplitter: Send + Sync {
    /// Split `result` into one file per pose inside `out_dir`, returned in
    /// pose rank order.
    async fn split(&self, result: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

pub struct VinaSplitRunner {
    executable_path: PathBuf,
    timeout: Duration,
}

const POSE_PREFIX: &str = "pose_";

impl VinaSplitRunner {
    pub fn new<P: AsRef<Path>>(executable_path: P, timeout: Duration) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            timeout,
        }
    }
}

#[async_trait]
impl PoseSplitter for VinaSplitRunner {
    async fn split(&self, result: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut cmd = Command::new(&self.executable_path);
        cmd.arg("--input")
            .arg(result)
            .arg("--ligand")
            .arg(out_dir.join(POSE_PREFIX));

        let output = run_with_timeout("vina_split", cmd, self.timeout).await?;
        if !output.status.success() {
            return Err(FerrodockError::Split(format!(
                "{}: {}",
                result.display(),
                stderr_tail(&output)
            )));
        }

        let poses = ordered_poses(out_dir, POSE_PREFIX)?;
        if poses.is_empty() {
            return Err(FerrodockError::Split(format!("{}: no poses produced", result.display())));
        }
        debug!("Split {:?} into {} poses", result, poses.len());
        Ok(poses)
    }
}

/// Files `<prefix><n>.pdbqt` in `dir`, sorted by `n`. vina_split zero-pads
/// the number depending on pose count, so ordering is numeric, not lexical.
pub fn ordered_poses(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut numbered: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pdbqt") {
            continue;
        }
        let rank = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(prefix))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(rank) = rank {
            numbered.push((rank, path));
        }
    }
    numbered.sort_by_key(|(rank, _)| *rank);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}
