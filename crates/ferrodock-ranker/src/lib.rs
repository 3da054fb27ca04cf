//! ferrodock-ranker — Log parsing, ranking and reporting over completed tasks.

pub mod parse;
pub mod aggregate;
pub mod report;

pub use aggregate::{AggregateReport, RankedTask, ResultAggregator};
pub use parse::{PoseRecord, VinaLogParser};
pub use report::HitStatistics;
