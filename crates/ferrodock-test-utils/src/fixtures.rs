//! File fixtures: ligand trees, Vina logs and PDB atoms.

use std::path::{Path, PathBuf};

/// Create each relative path under `root` with a small SDF-like body.
pub fn ligand_tree(root: &Path, items: &[&str]) -> Vec<PathBuf> {
    items
        .iter()
        .map(|rel| {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, format!("{rel}\n  fixture\n\nM  END\n$$$$\n")).unwrap();
            path
        })
        .collect()
}

/// Vina stdout with a mode table built from `(mode, affinity, rmsd_lb, rmsd_ub)`.
pub fn vina_log(table: &[(u32, f64, f64, f64)]) -> String {
    let mut log = String::from(
        "AutoDock Vina (fixture)\n\
         \n\
         mode |   affinity | dist from best mode\n     \
         | (kcal/mol) | rmsd l.b.| rmsd u.b.\n\
         -----+------------+----------+----------\n",
    );
    for (mode, affinity, lb, ub) in table {
        log.push_str(&format!("{mode:>4}    {affinity:>9.3}  {lb:>9.3}  {ub:>9.3}\n"));
    }
    log
}

/// One fixed-column ATOM record per coordinate.
pub fn pdb_atoms(coords: &[[f64; 3]]) -> String {
    coords
        .iter()
        .enumerate()
        .map(|(i, [x, y, z])| {
            format!(
                "ATOM  {:>5}  CA  ALA A{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C\n",
                i + 1,
                i + 1,
                x,
                y,
                z
            )
        })
        .collect()
}

/// Receptor PDB spanning the cube [0, 10] on each axis.
pub fn write_receptor(dir: &Path) -> PathBuf {
    let path = dir.join("receptor.pdb");
    let mut text = pdb_atoms(&[[0.0, 0.0, 0.0], [10.0, 10.0, 10.0], [5.0, 2.5, 7.5]]);
    text.push_str("END\n");
    std::fs::write(&path, text).unwrap();
    path
}
