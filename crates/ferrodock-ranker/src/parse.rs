//! Engine log parsing.

use ferrodock_common::TaskId;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One row of the engine's mode table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub task_id: TaskId,
    /// 1-based, as printed by the engine.
    pub mode: u32,
    /// kcal/mol, lower is stronger.
    pub affinity: f64,
    pub rmsd_lb: f64,
    pub rmsd_ub: f64,
    /// Affinity, RMSD l.b. and RMSD u.b. exactly as printed in the log.
    #[serde(skip)]
    pub printed: [String; 3],
}

impl PoseRecord {
    /// The three numeric columns for the summary table: the log's own text,
    /// or three decimals for records not read from a log.
    pub fn printed_fields(&self) -> [String; 3] {
        let values = [self.affinity, self.rmsd_lb, self.rmsd_ub];
        std::array::from_fn(|i| {
            if self.printed[i].is_empty() {
                format!("{:.3}", values[i])
            } else {
                self.printed[i].clone()
            }
        })
    }
}

/// Extracts mode rows (`mode affinity rmsd_lb rmsd_ub`) from Vina and
/// Vina-GPU stdout. Everything else in the log is ignored.
pub struct VinaLogParser {
    re_mode: Regex,
}

impl Default for VinaLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VinaLogParser {
    pub fn new() -> Self {
        Self {
            // "   1       -8.500      0.000      0.000"
            re_mode: Regex::new(
                r"^\s*(\d+)\s+(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*$",
            )
            .unwrap(),
        }
    }

    pub fn parse_line(&self, task_id: &TaskId, line: &str) -> Option<PoseRecord> {
        let caps = self.re_mode.captures(line)?;
        let mode: u32 = caps.get(1)?.as_str().parse().ok()?;
        if mode == 0 {
            return None;
        }
        let affinity = caps.get(2)?.as_str();
        let rmsd_lb = caps.get(3)?.as_str();
        let rmsd_ub = caps.get(4)?.as_str();
        Some(PoseRecord {
            task_id: task_id.clone(),
            mode,
            affinity: affinity.parse().ok()?,
            rmsd_lb: rmsd_lb.parse().ok()?,
            rmsd_ub: rmsd_ub.parse().ok()?,
            printed: [affinity.to_string(), rmsd_lb.to_string(), rmsd_ub.to_string()],
        })
    }

    /// Every mode row of `log`, in log order.
    pub fn parse(&self, task_id: &TaskId, log: &str) -> Vec<PoseRecord> {
        log.lines()
            .filter_map(|line| self.parse_line(task_id, line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VINA_STDOUT: &str = "\
AutoDock Vina v1.2.5
Scoring function : vina
Rigid receptor: receptor.pdbqt
Grid center: X 5 Y 5 Z 5
Performing docking (random seed: 42) ... done.

mode |   affinity | dist from best mode
     | (kcal/mol) | rmsd l.b.| rmsd u.b.
-----+------------+----------+----------
   1       -9.214          0          0
   2       -8.870      1.942      2.760
   3       -8.102      2.011      7.345
";

    #[test]
    fn test_parses_every_mode_row() {
        let parser = VinaLogParser::new();
        let rows = parser.parse(&TaskId::from("lig"), VINA_STDOUT);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].mode, 1);
        assert_eq!(rows[0].affinity, -9.214);
        assert_eq!(rows[0].rmsd_ub, 0.0);
        assert_eq!(rows[2].rmsd_ub, 7.345);
    }

    #[test]
    fn test_short_synthetic_log() {
        let rows = VinaLogParser::new().parse(&TaskId::from("T"), "1 -8.50 0.0 0.0\n2 -7.20 1.1 2.3\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].affinity, -7.2);
        assert_eq!(rows[1].rmsd_lb, 1.1);
        assert_eq!(rows[1].rmsd_ub, 2.3);
    }

    #[test]
    fn test_keeps_printed_text() {
        let parser = VinaLogParser::new();
        let row = parser.parse_line(&TaskId::from("T"), "1 -8.12345 0 2.30").unwrap();
        assert_eq!(row.affinity, -8.12345);
        assert_eq!(row.printed_fields(), ["-8.12345", "0", "2.30"]);

        let mut built = row.clone();
        built.printed = Default::default();
        assert_eq!(built.printed_fields(), ["-8.123", "0.000", "2.300"]);
    }

    #[test]
    fn test_ignores_non_table_lines() {
        let parser = VinaLogParser::new();
        let id = TaskId::from("x");
        assert!(parser.parse_line(&id, "Grid center: X 5 Y 5 Z 5").is_none());
        assert!(parser.parse_line(&id, "1 -8.5 0.0").is_none());
        assert!(parser.parse_line(&id, "0 -8.5 0.0 0.0").is_none());
        assert!(parser.parse(&id, "").is_empty());
    }
}
