//! Minimal PDB / PDBQT record handling: coordinate extraction for box
//! geometry and structure records for complex building.

use std::path::Path;

use ferrodock_common::geometry::{compute_box, BoxGeometry, BoxSizing, Extents};
use ferrodock_common::{FerrodockError, Result};
use tracing::debug;

fn is_atom_record(line: &str) -> bool {
    line.starts_with("ATOM  ") || line.starts_with("HETATM")
}

/// Parse x/y/z from the fixed columns 31-54 of an ATOM/HETATM record.
pub fn atom_coordinates(line: &str) -> Option<[f64; 3]> {
    if !is_atom_record(line) {
        return None;
    }
    let field = |start: usize, end: usize| line.get(start..end).and_then(|s| s.trim().parse::<f64>().ok());
    Some([field(30, 38)?, field(38, 46)?, field(46, 54)?])
}

/// Coordinate extents of every atom in a PDB-like text.
pub fn extents(text: &str) -> Option<Extents> {
    Extents::from_points(text.lines().filter_map(atom_coordinates))
}

/// Box for the structure at `path` (PDB or PDBQT).
pub async fn box_for_structure(path: &Path, sizing: BoxSizing) -> Result<BoxGeometry> {
    if !path.exists() {
        return Err(FerrodockError::MissingInput(path.to_path_buf()));
    }
    let text = tokio::fs::read_to_string(path).await?;
    let extents = extents(&text).ok_or_else(|| {
        FerrodockError::Config(format!("{} contains no ATOM/HETATM records", path.display()))
    })?;
    let geometry = compute_box(&extents, sizing);
    debug!(?extents, ?geometry, "Box computed for {:?}", path);
    Ok(geometry)
}

/// Structure records of a PDB text, without END / ENDMDL / MODEL lines, so it
/// can be concatenated with another structure.
pub fn structure_records(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| {
        let record = line.get(..6).unwrap_or(line).trim_end();
        !matches!(record, "END" | "ENDMDL" | "MODEL" | "CONECT" | "MASTER")
    })
}
