//! Structure format conversion using Open Babel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ferrodock_common::{FerrodockError, Result};
use tokio::process::Command;
use tracing::{debug, info};

use crate::process::{run_with_timeout, stderr_tail};

/// What a converted structure is used for. Open Babel needs different flags
/// for a rigid receptor than for a flexible ligand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureRole {
    Receptor,
    Ligand,
    Pose,
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub role: StructureRole,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, role: StructureRole) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            role,
        }
    }
}

/// Reads and writes chemical exchange formats. Formats follow file extensions.
#[async_trait]
pub trait FormatConverter: Send + Sync {
    async fn convert(&self, request: &ConversionRequest) -> Result<()>;

    /// Concatenate several structures into one multi-structure file.
    async fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// Wrapper for `obabel` execution.
pub struct OpenBabelConverter {
    executable_path: PathBuf,
    timeout: Duration,
}

impl OpenBabelConverter {
    pub fn new<P: AsRef<Path>>(executable_path: P, timeout: Duration) -> Self {
        Self {
            executable_path: executable_path.as_ref().to_path_buf(),
            timeout,
        }
    }

    fn role_args(request: &ConversionRequest) -> Vec<&'static str> {
        match request.role {
            StructureRole::Receptor => vec!["-xr"],
            StructureRole::Ligand => {
                let needs_3d = request
                    .input
                    .extension()
                    .map(|e| e.eq_ignore_ascii_case("smi"))
                    .unwrap_or(false);
                if needs_3d {
                    vec!["-h", "--gen3d"]
                } else {
                    vec!["-h"]
                }
            }
            StructureRole::Pose => vec![],
        }
    }
}

#[async_trait]
impl FormatConverter for OpenBabelConverter {
    async fn convert(&self, request: &ConversionRequest) -> Result<()> {
        debug!("Converting {:?} -> {:?}", request.input, request.output);

        let mut cmd = Command::new(&self.executable_path);
        cmd.arg(&request.input)
            .arg("-O")
            .arg(&request.output)
            .args(Self::role_args(request));

        let output = run_with_timeout("obabel", cmd, self.timeout).await?;
        if !output.status.success() {
            return Err(FerrodockError::Conversion(format!(
                "{}: {}",
                request.input.display(),
                stderr_tail(&output)
            )));
        }

        // obabel exits 0 after "0 molecules converted", so check the file itself.
        ensure_non_empty(&request.output).await.map_err(|_| {
            FerrodockError::Conversion(format!(
                "{}: no structure written ({})",
                request.input.display(),
                stderr_tail(&output)
            ))
        })
    }

    async fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(FerrodockError::Conversion("nothing to combine".into()));
        }
        info!("Combining {} structures into {:?}", inputs.len(), output);

        let mut cmd = Command::new(&self.executable_path);
        cmd.args(inputs).arg("-O").arg(output);

        let result = run_with_timeout("obabel", cmd, self.timeout).await?;
        if !result.status.success() {
            return Err(FerrodockError::Conversion(format!(
                "combine into {}: {}",
                output.display(),
                stderr_tail(&result)
            )));
        }
        ensure_non_empty(output).await
    }
}

async fn ensure_non_empty(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(FerrodockError::Conversion(format!("{} is missing or empty", path.display()))),
    }
}
