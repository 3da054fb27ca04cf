//! Molecular docking using AutoDock Vina (CPU) or a Vina-GPU build.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ferrodock_common::config::{EngineMode, PipelineConfig};
use ferrodock_common::{FerrodockError, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{run_with_timeout, stderr_tail};

/// One docking invocation.
#[derive(Debug, Clone)]
pub struct DockingRequest {
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    /// Multi-pose result written by the engine.
    pub out: PathBuf,
}

/// Captured output of a successful docking run.
#[derive(Debug, Clone)]
pub struct DockingOutput {
    pub result: PathBuf,
    /// Engine stdout, which carries the mode/affinity table.
    pub log: String,
}

#[async_trait]
pub trait DockingEngine: Send + Sync {
    async fn dock(&self, request: &DockingRequest, config: &PipelineConfig) -> Result<DockingOutput>;
}

/// Wrapper for Vina execution. The executable and thread flags follow the
/// configured engine mode.
pub struct VinaRunner;

impl VinaRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(executable: &Path, request: &DockingRequest, config: &PipelineConfig) -> Command {
        let g = &config.geometry;
        let mut cmd = Command::new(executable);
        cmd.arg("--receptor")
            .arg(&request.receptor)
            .arg("--ligand")
            .arg(&request.ligand)
            .arg("--center_x")
            .arg(g.center[0].to_string())
            .arg("--center_y")
            .arg(g.center[1].to_string())
            .arg("--center_z")
            .arg(g.center[2].to_string())
            .arg("--size_x")
            .arg(g.size[0].to_string())
            .arg("--size_y")
            .arg(g.size[1].to_string())
            .arg("--size_z")
            .arg(g.size[2].to_string())
            .arg("--num_modes")
            .arg(config.num_modes.to_string())
            .arg("--out")
            .arg(&request.out);

        match config.mode {
            EngineMode::Cpu => {
                cmd.arg("--exhaustiveness")
                    .arg(config.exhaustiveness.to_string())
                    .arg("--cpu")
                    .arg(config.threads.to_string());
            }
            EngineMode::Gpu => {
                cmd.arg("--thread").arg(config.gpu_threads.to_string());
            }
        }
        cmd
    }
}

impl Default for VinaRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DockingEngine for VinaRunner {
    async fn dock(&self, request: &DockingRequest, config: &PipelineConfig) -> Result<DockingOutput> {
        let executable = config.engine_executable();
        info!("Running Vina ({:?}) on {:?}", config.mode, request.ligand);

        let cmd = Self::build_command(executable, request, config);
        let output = run_with_timeout("vina", cmd, config.timeouts.dock()).await?;

        if !output.status.success() {
            return Err(FerrodockError::Engine(format!(
                "{}: {}",
                request.ligand.display(),
                stderr_tail(&output)
            )));
        }
        if !request.out.exists() {
            return Err(FerrodockError::Engine(format!(
                "{}: engine exited cleanly but wrote no result",
                request.ligand.display()
            )));
        }

        debug!("Vina completed successfully. Output in {:?}", request.out);
        Ok(DockingOutput {
            result: request.out.clone(),
            log: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodock_common::{BoxGeometry, ConfigFile};

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn request() -> DockingRequest {
        DockingRequest {
            receptor: "receptor.pdbqt".into(),
            ligand: "lig.pdbqt".into(),
            out: "out.pdbqt".into(),
        }
    }

    fn config(mode: EngineMode) -> PipelineConfig {
        let mut file = ConfigFile::default();
        file.docking.mode = mode;
        file.docking.threads = 3;
        PipelineConfig::from_file(&file, BoxGeometry::new([1.5, -2.0, 0.0], [20.0, 22.0, 24.0]), 4096)
    }

    #[test]
    fn test_cpu_command_carries_box_and_threads() {
        let cfg = config(EngineMode::Cpu);
        let a = args(&VinaRunner::build_command(cfg.engine_executable(), &request(), &cfg));
        let pos = |flag: &str| a.iter().position(|x| x == flag).unwrap();
        assert_eq!(a[pos("--center_x") + 1], "1.5");
        assert_eq!(a[pos("--center_y") + 1], "-2");
        assert_eq!(a[pos("--size_z") + 1], "24");
        assert_eq!(a[pos("--cpu") + 1], "3");
        assert_eq!(a[pos("--exhaustiveness") + 1], "8");
        assert!(!a.contains(&"--thread".to_string()));
    }

    #[test]
    fn test_gpu_command_uses_gpu_threads() {
        let cfg = config(EngineMode::Gpu);
        let cmd = VinaRunner::build_command(cfg.engine_executable(), &request(), &cfg);
        assert_eq!(cmd.as_std().get_program(), "QuickVina2-GPU-2-1");
        let a = args(&cmd);
        let pos = a.iter().position(|x| x == "--thread").unwrap();
        assert_eq!(a[pos + 1], "4096");
        assert!(!a.contains(&"--cpu".to_string()));
    }
}
