//! ferrodock-runtime — Batch execution: checkpoints, the job ledger and the
//! bounded worker pool.

pub mod checkpoint;
pub mod ledger;
pub mod scheduler;

pub use checkpoint::{source_digest, CheckpointStore, CompletionMarker};
pub use ledger::{JobLedger, JobLedgerEntry, LedgerSummary};
pub use scheduler::{discover_items, BatchOutcome, WorkerPool};
