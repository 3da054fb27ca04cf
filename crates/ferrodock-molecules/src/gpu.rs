//! GPU search-thread selection.
//!
//! Vina-GPU builds take a `--thread` count that has to fit in device memory.
//! [`GpuThreadPolicy`] scales it with total memory and clamps it; an explicit
//! override bypasses the policy entirely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ferrodock_common::config::GpuConfig;
use ferrodock_common::{FerrodockError, Result};
use tokio::process::Command;
use tracing::{info, warn};

use crate::process::run_with_timeout;

/// Reports total memory of the first visible GPU.
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    async fn total_memory_mib(&self) -> Result<u64>;
}

pub struct NvidiaSmiProbe {
    executable_path: PathBuf,
}

impl NvidiaSmiProbe {
    pub fn new<P: AsRef<Path>>(executable_path: P) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DeviceProbe for NvidiaSmiProbe {
    async fn total_memory_mib(&self) -> Result<u64> {
        let mut cmd = Command::new(&self.executable_path);
        cmd.arg("--query-gpu=memory.total").arg("--format=csv,noheader,nounits");

        let output = run_with_timeout("nvidia-smi", cmd, Duration::from_secs(15))
            .await
            .map_err(|e| FerrodockError::DeviceUnavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(FerrodockError::DeviceUnavailable(format!(
                "nvidia-smi exited with {}",
                output.status
            )));
        }

        parse_memory_mib(&String::from_utf8_lossy(&output.stdout))
    }
}

/// First line of `nvidia-smi --query-gpu=memory.total` output, in MiB.
pub fn parse_memory_mib(stdout: &str) -> Result<u64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<u64>().ok())
        .ok_or_else(|| FerrodockError::DeviceUnavailable(format!("unexpected nvidia-smi output: {stdout:?}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuThreadPolicy {
    pub threads_per_gib: u32,
    pub min_threads: u32,
    pub max_threads: u32,
    pub fallback_threads: u32,
}

impl GpuThreadPolicy {
    pub fn from_config(config: &GpuConfig) -> Self {
        Self {
            threads_per_gib: config.threads_per_gib,
            min_threads: config.min_threads.min(config.max_threads),
            max_threads: config.max_threads,
            fallback_threads: config.fallback_threads,
        }
    }

    pub fn threads_for_memory(&self, total_mib: u64) -> u32 {
        let scaled = total_mib.saturating_mul(self.threads_per_gib as u64) / 1024;
        scaled.clamp(self.min_threads as u64, self.max_threads as u64) as u32
    }
}

/// Thread count for a GPU run: override, else policy over probed memory,
/// else the policy's fallback when no device answers.
pub async fn resolve_gpu_threads(config: &GpuConfig, probe: &dyn DeviceProbe) -> u32 {
    if let Some(threads) = config.thread_override {
        info!(threads, "Using GPU thread override");
        return threads;
    }

    let policy = GpuThreadPolicy::from_config(config);
    match probe.total_memory_mib().await {
        Ok(mib) => {
            let threads = policy.threads_for_memory(mib);
            info!(total_mib = mib, threads, "GPU thread count derived from device memory");
            threads
        }
        Err(e) => {
            warn!("{e}; falling back to {} GPU threads", policy.fallback_threads);
            policy.fallback_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Option<u64>);

    #[async_trait]
    impl DeviceProbe for FixedProbe {
        async fn total_memory_mib(&self) -> Result<u64> {
            self.0
                .ok_or_else(|| FerrodockError::DeviceUnavailable("no device".into()))
        }
    }

    #[test]
    fn test_policy_clamps() {
        let policy = GpuThreadPolicy::from_config(&GpuConfig::default());
        assert_eq!(policy.threads_for_memory(512), 1000);
        assert_eq!(policy.threads_for_memory(4 * 1024), 4000);
        assert_eq!(policy.threads_for_memory(80 * 1024), 8000);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory_mib("24564\n24564\n").unwrap(), 24564);
        assert!(parse_memory_mib("No devices were found").is_err());
    }

    #[tokio::test]
    async fn test_override_wins() {
        let config = GpuConfig {
            thread_override: Some(1234),
            ..Default::default()
        };
        assert_eq!(resolve_gpu_threads(&config, &FixedProbe(Some(8192))).await, 1234);
    }

    #[tokio::test]
    async fn test_missing_device_falls_back() {
        let config = GpuConfig::default();
        assert_eq!(resolve_gpu_threads(&config, &FixedProbe(None)).await, 8000);
        assert_eq!(resolve_gpu_threads(&config, &FixedProbe(Some(6 * 1024))).await, 6000);
    }
}
