//! `ferrodock box`: search box from a target's coordinate extents.

use anyhow::{Context, Result};
use ferrodock_common::geometry::{BoxGeometry, BoxSizing};
use ferrodock_molecules::pdb::box_for_structure;

use crate::cli::BoxArgs;

pub async fn execute(args: BoxArgs) -> Result<()> {
    let sizing = BoxSizing::from_options(args.padding, args.size);
    let geometry = box_for_structure(&args.target, sizing)
        .await
        .with_context(|| format!("computing box for {}", args.target.display()))?;
    print!("{}", render(&geometry));
    Ok(())
}

/// Vina config-file syntax, so the output can be pasted or redirected.
fn render(geometry: &BoxGeometry) -> String {
    let mut out = String::new();
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        out.push_str(&format!("center_{name} = {:.3}\n", geometry.center[axis]));
    }
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        out.push_str(&format!("size_{name} = {:.3}\n", geometry.size[axis]));
    }
    out
}
