use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ferrodock")]
#[command(version)]
#[command(about = "Batch molecular docking against a single target", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repeat for more detail (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dock every item under a directory against the target
    Run(RunArgs),
    /// Print the search box for a target structure
    Box(BoxArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Target structure (PDB or PDBQT)
    #[arg(short, long, value_name = "FILE")]
    pub target: PathBuf,

    /// Directory searched recursively for ligands
    #[arg(short, long, value_name = "DIR")]
    pub ligands: PathBuf,

    /// Configuration file (default: $FERRODOCK_CONFIG or ./ferrodock.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dock with the GPU engine
    #[arg(long)]
    pub gpu: bool,

    /// Concurrent docking tasks
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// CPU threads per task
    #[arg(long, value_name = "N")]
    pub threads: Option<u32>,

    /// GPU search threads, bypassing the memory-based heuristic
    #[arg(long, value_name = "N")]
    pub gpu_threads: Option<u32>,

    #[arg(long, value_name = "N")]
    pub exhaustiveness: Option<u32>,

    #[arg(long, value_name = "N")]
    pub num_modes: Option<u32>,

    /// Box center; derived from the target when omitted
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true)]
    pub center: Option<Vec<f64>>,

    /// Box edge lengths; target extents plus padding when omitted
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pub size: Option<Vec<f64>>,

    /// Padding added to the target extents
    #[arg(long, value_name = "ANGSTROM")]
    pub padding: Option<f64>,

    /// Number of hits in the ranking summary
    #[arg(long, value_name = "K")]
    pub top_k: Option<usize>,

    /// Existing run directory; completed tasks in it are skipped
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Parent of the timestamped run directory
    #[arg(long, value_name = "DIR")]
    pub output_base: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct BoxArgs {
    /// Target structure (PDB or PDBQT)
    #[arg(value_name = "FILE")]
    pub target: PathBuf,

    /// Padding added to the extents on each axis
    #[arg(long, default_value_t = 4.0)]
    pub padding: f64,

    /// Fixed edge length on every axis; padding is ignored
    #[arg(long)]
    pub size: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "ferrodock", "run", "--target", "rec.pdb", "--ligands", "ligs", "--gpu", "-j", "8",
            "--center", "1.5", "-2", "3", "-v",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.gpu);
        assert_eq!(args.jobs, Some(8));
        assert_eq!(args.center, Some(vec![1.5, -2.0, 3.0]));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_box_arguments() {
        let cli = Cli::parse_from(["ferrodock", "box", "rec.pdb", "--size", "20"]);
        let Command::Box(args) = cli.command else {
            panic!("expected box");
        };
        assert_eq!(args.size, Some(20.0));
        assert_eq!(args.padding, 4.0);
    }
}
