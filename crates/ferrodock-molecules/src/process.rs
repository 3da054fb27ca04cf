//! Subprocess execution shared by the tool wrappers.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use ferrodock_common::config::{EngineMode, ToolPaths};
use ferrodock_common::{FerrodockError, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Run `command` to completion, killing it if it outlives `timeout`.
pub async fn run_with_timeout(tool: &str, mut command: Command, timeout: Duration) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(tool, ?timeout, "Spawning external tool");
    let child = command.spawn().map_err(|e| spawn_error(tool, e))?;

    // Dropping the future on timeout drops the child, which kills it.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(FerrodockError::Timeout {
            tool: tool.to_string(),
            after: timeout,
        }),
    }
}

/// A binary that is absent or not executable is a missing dependency. Any
/// other spawn failure (descriptor exhaustion and the like) stays an I/O error.
fn spawn_error(tool: &str, e: std::io::Error) -> FerrodockError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => FerrodockError::MissingDependency {
            tool: tool.to_string(),
            reason: e.to_string(),
        },
        _ => FerrodockError::Io(e),
    }
}

/// Last few lines of a tool's stderr, for error messages.
pub fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        format!("exit status {}", output.status)
    } else {
        format!("exit status {}: {}", output.status, tail)
    }
}

/// Resolve an executable: paths with a separator are checked directly,
/// bare names are searched on `PATH`.
pub fn resolve_executable(tool: &str, path: &Path) -> Result<PathBuf> {
    let missing = |reason: &str| FerrodockError::MissingDependency {
        tool: tool.to_string(),
        reason: format!("{} ({})", reason, path.display()),
    };

    if path.components().count() > 1 || path.is_absolute() {
        return if is_executable(path) {
            Ok(path.to_path_buf())
        } else {
            Err(missing("not found or not executable"))
        };
    }

    let search = std::env::var_os("PATH").ok_or_else(|| missing("PATH is not set"))?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(path))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| missing("not found on PATH"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Check every tool the run needs before anything is dispatched.
pub fn ensure_dependencies(tools: &ToolPaths, mode: EngineMode) -> Result<ToolPaths> {
    let resolved = ToolPaths {
        obabel: resolve_executable("obabel", &tools.obabel)?,
        vina: match mode {
            EngineMode::Cpu => resolve_executable("vina", &tools.vina)?,
            EngineMode::Gpu => tools.vina.clone(),
        },
        vina_gpu: match mode {
            EngineMode::Gpu => resolve_executable("vina-gpu", &tools.vina_gpu)?,
            EngineMode::Cpu => tools.vina_gpu.clone(),
        },
        vina_split: resolve_executable("vina_split", &tools.vina_split)?,
        nvidia_smi: tools.nvidia_smi.clone(),
    };
    info!(
        obabel = %resolved.obabel.display(),
        engine = %resolved.engine(mode).display(),
        vina_split = %resolved.vina_split.display(),
        "External tools resolved"
    );
    Ok(resolved)
}
