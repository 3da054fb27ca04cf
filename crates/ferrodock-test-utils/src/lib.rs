//! Shared testing utilities for the Ferrodock workspace.

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeConverter, FakeEngine, FakeSplitter, ModeTable};
pub use fixtures::{ligand_tree, pdb_atoms, vina_log, write_receptor};
