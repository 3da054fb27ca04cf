//! Receptor–pose complex files.

use std::path::Path;

use ferrodock_common::Result;

use crate::pdb::structure_records;

/// Chain terminator placed between receptor and ligand.
pub const CHAIN_TERMINATOR: &str = "TER";

/// Receptor followed by `TER`, then the pose, then `END`.
pub fn complex_text(receptor_pdb: &str, pose_pdb: &str) -> String {
    let mut out = String::with_capacity(receptor_pdb.len() + pose_pdb.len() + 16);
    for line in structure_records(receptor_pdb) {
        out.push_str(line);
        out.push('\n');
    }
    if !out.lines().last().map(|l| l.starts_with(CHAIN_TERMINATOR)).unwrap_or(false) {
        out.push_str(CHAIN_TERMINATOR);
        out.push('\n');
    }
    for line in structure_records(pose_pdb) {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

pub async fn write_complex(receptor_pdb: &str, pose_pdb: &Path, output: &Path) -> Result<()> {
    let pose = tokio::fs::read_to_string(pose_pdb).await?;
    tokio::fs::write(output, complex_text(receptor_pdb, &pose)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_layout() {
        let receptor = "ATOM      1  CA  ALA A   1       1.000   1.000   1.000\nEND\n";
        let pose = "MODEL 1\nHETATM    1  C1  UNL     1       2.000   2.000   2.000\nENDMDL\n";
        let text = complex_text(receptor, pose);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ATOM"));
        assert_eq!(lines[1], "TER");
        assert!(lines[2].starts_with("HETATM"));
        assert_eq!(lines[3], "END");
    }

    #[test]
    fn test_existing_terminator_not_doubled() {
        let receptor = "ATOM      1  CA  ALA A   1       1.000   1.000   1.000\nTER\n";
        let text = complex_text(receptor, "HETATM    1  C1  UNL     1       2.000   2.000   2.000\n");
        assert_eq!(text.matches("TER").count(), 1);
    }
}
