//! Run configuration.
//!
//! `ConfigFile` mirrors `ferrodock.toml` section by section; every field has a
//! default so an empty file (or no file) is valid. The CLI layers its flags on
//! top and freezes the result into a [`PipelineConfig`], which every worker
//! shares read-only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FerrodockError, Result};
use crate::geometry::BoxGeometry;

pub const CONFIG_ENV: &str = "FERRODOCK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "ferrodock.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Cpu,
    Gpu,
}

impl Default for EngineMode {
    fn default() -> Self {
        EngineMode::Cpu
    }
}

/// How a previous run's output is judged complete on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRule {
    /// A `.done` marker written after every step succeeded.
    Marker,
    /// Any non-empty output directory. Can mistake an interrupted task for a finished one.
    NonEmptyDirectory,
}

impl Default for CompletionRule {
    fn default() -> Self {
        CompletionRule::Marker
    }
}

// ── File sections ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub docking: DockingConfig,
    #[serde(default, rename = "box")]
    pub box_: BoxConfig,
    #[serde(default)]
    pub tools: ToolPaths,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub gpu: GpuConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingConfig {
    #[serde(default)]
    pub mode: EngineMode,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_exhaustiveness")]
    pub exhaustiveness: u32,
    #[serde(default = "default_num_modes")]
    pub num_modes: u32,
    #[serde(default = "default_output_base")]
    pub output_base: PathBuf,
}

fn default_concurrency() -> usize { 4 }
fn default_threads() -> u32 { 2 }
fn default_exhaustiveness() -> u32 { 8 }
fn default_num_modes() -> u32 { 9 }
fn default_output_base() -> PathBuf { PathBuf::from(".") }

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::default(),
            concurrency: default_concurrency(),
            threads: default_threads(),
            exhaustiveness: default_exhaustiveness(),
            num_modes: default_num_modes(),
            output_base: default_output_base(),
        }
    }
}

/// Search box. When `center` is absent the box is derived from the target's
/// coordinate extents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxConfig {
    pub center: Option<[f64; 3]>,
    pub size: Option<[f64; 3]>,
    #[serde(default = "default_padding")]
    pub padding: f64,
}

fn default_padding() -> f64 { 4.0 }

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            center: None,
            size: None,
            padding: default_padding(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_obabel")]
    pub obabel: PathBuf,
    #[serde(default = "default_vina")]
    pub vina: PathBuf,
    #[serde(default = "default_vina_gpu")]
    pub vina_gpu: PathBuf,
    #[serde(default = "default_vina_split")]
    pub vina_split: PathBuf,
    #[serde(default = "default_nvidia_smi")]
    pub nvidia_smi: PathBuf,
}

fn default_obabel() -> PathBuf { PathBuf::from("obabel") }
fn default_vina() -> PathBuf { PathBuf::from("vina") }
fn default_vina_gpu() -> PathBuf { PathBuf::from("QuickVina2-GPU-2-1") }
fn default_vina_split() -> PathBuf { PathBuf::from("vina_split") }
fn default_nvidia_smi() -> PathBuf { PathBuf::from("nvidia-smi") }

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            obabel: default_obabel(),
            vina: default_vina(),
            vina_gpu: default_vina_gpu(),
            vina_split: default_vina_split(),
            nvidia_smi: default_nvidia_smi(),
        }
    }
}

impl ToolPaths {
    /// Docking executable for the given engine mode.
    pub fn engine(&self, mode: EngineMode) -> &Path {
        match mode {
            EngineMode::Cpu => &self.vina,
            EngineMode::Gpu => &self.vina_gpu,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_convert_secs")]
    pub convert_secs: u64,
    #[serde(default = "default_dock_secs")]
    pub dock_secs: u64,
    #[serde(default = "default_split_secs")]
    pub split_secs: u64,
}

fn default_convert_secs() -> u64 { 120 }
fn default_dock_secs() -> u64 { 3600 }
fn default_split_secs() -> u64 { 60 }

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            convert_secs: default_convert_secs(),
            dock_secs: default_dock_secs(),
            split_secs: default_split_secs(),
        }
    }
}

impl Timeouts {
    pub fn convert(&self) -> Duration {
        Duration::from_secs(self.convert_secs)
    }

    pub fn dock(&self) -> Duration {
        Duration::from_secs(self.dock_secs)
    }

    pub fn split(&self) -> Duration {
        Duration::from_secs(self.split_secs)
    }
}

/// GPU thread heuristic bounds. `thread_override` bypasses the heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuConfig {
    pub thread_override: Option<u32>,
    #[serde(default = "default_threads_per_gib")]
    pub threads_per_gib: u32,
    #[serde(default = "default_min_gpu_threads")]
    pub min_threads: u32,
    #[serde(default = "default_max_gpu_threads")]
    pub max_threads: u32,
    #[serde(default = "default_fallback_gpu_threads")]
    pub fallback_threads: u32,
}

fn default_threads_per_gib() -> u32 { 1000 }
fn default_min_gpu_threads() -> u32 { 1000 }
fn default_max_gpu_threads() -> u32 { 8000 }
fn default_fallback_gpu_threads() -> u32 { 8000 }

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            thread_override: None,
            threads_per_gib: default_threads_per_gib(),
            min_threads: default_min_gpu_threads(),
            max_threads: default_max_gpu_threads(),
            fallback_threads: default_fallback_gpu_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_hit_threshold")]
    pub hit_threshold: f64,
}

fn default_top_k() -> usize { 5 }
fn default_hit_threshold() -> f64 { -8.0 }

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            hit_threshold: default_hit_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub rule: CompletionRule,
}

impl ConfigFile {
    /// Load from an explicit path. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FerrodockError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ConfigFile = toml::from_str(&content)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load `$FERRODOCK_CONFIG` or `./ferrodock.toml`, falling back to defaults
    /// when neither exists.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() {
            Self::load(&path)
        } else {
            debug!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }
}

// ── Frozen run configuration ────────────────────────────────────────────────

/// Immutable configuration shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: EngineMode,
    pub geometry: BoxGeometry,
    pub concurrency: usize,
    /// CPU threads handed to the engine per task.
    pub threads: u32,
    /// GPU search threads, resolved by the GPU thread policy.
    pub gpu_threads: u32,
    pub exhaustiveness: u32,
    pub num_modes: u32,
    pub tools: ToolPaths,
    pub timeouts: Timeouts,
    pub top_k: usize,
    pub hit_threshold: f64,
    pub completion_rule: CompletionRule,
}

impl PipelineConfig {
    /// Build from a loaded file plus a resolved box and GPU thread count.
    pub fn from_file(file: &ConfigFile, geometry: BoxGeometry, gpu_threads: u32) -> Self {
        Self {
            mode: file.docking.mode,
            geometry,
            concurrency: file.docking.concurrency,
            threads: file.docking.threads,
            gpu_threads,
            exhaustiveness: file.docking.exhaustiveness,
            num_modes: file.docking.num_modes,
            tools: file.tools.clone(),
            timeouts: file.timeouts.clone(),
            top_k: file.report.top_k,
            hit_threshold: file.report.hit_threshold,
            completion_rule: file.checkpoint.rule,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(FerrodockError::Config("concurrency must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(FerrodockError::Config("threads per task must be at least 1".into()));
        }
        if self.mode == EngineMode::Gpu && self.gpu_threads == 0 {
            return Err(FerrodockError::Config("GPU thread count must be at least 1".into()));
        }
        if self.num_modes == 0 {
            return Err(FerrodockError::Config("num_modes must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(FerrodockError::Config("top_k must be at least 1".into()));
        }
        self.geometry.validate()?;
        Ok(())
    }

    pub fn engine_executable(&self) -> &Path {
        self.tools.engine(self.mode)
    }
}
