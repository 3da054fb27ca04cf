//! Run configuration for the `ferrodock` binary.
//! Command-line flags are layered over the TOML file, then the search box is
//! resolved against the target structure.

use std::path::Path;

use ferrodock_common::config::EngineMode;
use ferrodock_common::geometry::{BoxGeometry, BoxSizing};
use ferrodock_common::{ConfigFile, FerrodockError, Result};
use ferrodock_molecules::pdb::box_for_structure;

use crate::cli::RunArgs;

/// Load the file named by `--config`, or the default location.
pub fn load(args: &RunArgs) -> Result<ConfigFile> {
    match &args.config {
        Some(path) => ConfigFile::load(path),
        None => ConfigFile::load_default(),
    }
}

fn triple(values: &[f64], flag: &str) -> Result<[f64; 3]> {
    <[f64; 3]>::try_from(values)
        .map_err(|_| FerrodockError::Config(format!("--{flag} takes exactly three values")))
}

/// Flags given on the command line win over file values.
pub fn apply_overrides(file: &mut ConfigFile, args: &RunArgs) -> Result<()> {
    if args.gpu {
        file.docking.mode = EngineMode::Gpu;
    }
    if let Some(jobs) = args.jobs {
        file.docking.concurrency = jobs;
    }
    if let Some(threads) = args.threads {
        file.docking.threads = threads;
    }
    if let Some(threads) = args.gpu_threads {
        file.gpu.thread_override = Some(threads);
    }
    if let Some(exhaustiveness) = args.exhaustiveness {
        file.docking.exhaustiveness = exhaustiveness;
    }
    if let Some(num_modes) = args.num_modes {
        file.docking.num_modes = num_modes;
    }
    if let Some(center) = &args.center {
        file.box_.center = Some(triple(center, "center")?);
    }
    if let Some(size) = &args.size {
        file.box_.size = Some(triple(size, "size")?);
    }
    if let Some(padding) = args.padding {
        file.box_.padding = padding;
    }
    if let Some(top_k) = args.top_k {
        file.report.top_k = top_k;
    }
    if let Some(base) = &args.output_base {
        file.docking.output_base = base.clone();
    }
    Ok(())
}

/// Box from the configured center and size. Whatever is missing comes from
/// the target's extents plus padding.
pub async fn resolve_geometry(file: &ConfigFile, target: &Path) -> Result<BoxGeometry> {
    let configured = &file.box_;
    if let (Some(center), Some(size)) = (configured.center, configured.size) {
        return Ok(BoxGeometry::new(center, size));
    }

    let derived = box_for_structure(target, BoxSizing::Padding(configured.padding)).await?;
    Ok(BoxGeometry::new(
        configured.center.unwrap_or(derived.center),
        configured.size.unwrap_or(derived.size),
    ))
}
