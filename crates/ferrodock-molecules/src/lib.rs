//! Ferrodock Molecules - Structure handling and external tool adapters.
//!
//! Each task goes through:
//! 1. Format conversion (Open Babel)
//! 2. Docking (AutoDock Vina or a Vina-GPU build)
//! 3. Pose splitting (vina_split)
//! 4. Receptor–pose complex building
//!
//! [`pipeline::TaskPipeline`] chains the steps for one task.

pub mod process;
pub mod convert;
pub mod docking;
pub mod split;
pub mod gpu;
pub mod pdb;
pub mod complex;
pub mod pipeline;

pub use convert::{ConversionRequest, FormatConverter, OpenBabelConverter, StructureRole};
pub use docking::{DockingEngine, DockingOutput, DockingRequest, VinaRunner};
pub use pipeline::{PipelineReport, PipelineStep, PreparedTarget, TaskFailure, TaskPipeline};
pub use split::{PoseSplitter, VinaSplitRunner};
