//! Append-only job ledger (`jobs.log`).
//!
//! One tab-separated row per dispatched task, in completion order. Each row is
//! flushed as soon as it is written so an interrupted run keeps its history.
//! Reopening an existing ledger appends to it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ferrodock_common::{FerrodockError, Result, TaskId};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DELIMITER: u8 = b'\t';
const HEADER: [&str; 6] = ["task_id", "exit_status", "start_time", "end_time", "step", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLedgerEntry {
    pub task_id: TaskId,
    /// 0 on success, 1 on failure.
    pub exit_status: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Step that failed.
    pub step: Option<String>,
    pub error: Option<String>,
}

impl JobLedgerEntry {
    pub fn succeeded(&self) -> bool {
        self.exit_status == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sorted.
    pub failed_ids: Vec<TaskId>,
}

struct LedgerState {
    writer: csv::Writer<File>,
    entries: Vec<JobLedgerEntry>,
}

pub struct JobLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl JobLedger {
    /// Open `path` for appending, writing the header if the file is new.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let fresh = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        debug!("Ledger opened at {:?}", path);

        Ok(Self {
            path,
            state: Mutex::new(LedgerState {
                writer,
                entries: Vec::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: JobLedgerEntry) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| FerrodockError::Scheduler("ledger lock poisoned".into()))?;
        state.writer.serialize(&entry)?;
        state.writer.flush()?;
        state.entries.push(entry);
        Ok(())
    }

    /// Entries appended through this handle, in completion order.
    pub fn entries(&self) -> Result<Vec<JobLedgerEntry>> {
        let state = self
            .state
            .lock()
            .map_err(|_| FerrodockError::Scheduler("ledger lock poisoned".into()))?;
        Ok(state.entries.clone())
    }

    /// Totals over the entries appended through this handle.
    pub fn summarize(&self) -> Result<LedgerSummary> {
        Ok(summarize(&self.entries()?))
    }
}

pub fn summarize(entries: &[JobLedgerEntry]) -> LedgerSummary {
    let mut failed_ids: Vec<TaskId> = entries
        .iter()
        .filter(|e| !e.succeeded())
        .map(|e| e.task_id.clone())
        .collect();
    failed_ids.sort();

    LedgerSummary {
        dispatched: entries.len(),
        succeeded: entries.iter().filter(|e| e.succeeded()).count(),
        failed: failed_ids.len(),
        failed_ids,
    }
}

/// Read every entry of a ledger file, across all runs that appended to it.
pub fn read_ledger(path: &Path) -> Result<Vec<JobLedgerEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, exit_status: i32) -> JobLedgerEntry {
        let now = Utc::now();
        JobLedgerEntry {
            task_id: TaskId::from(id),
            exit_status,
            start_time: now,
            end_time: now,
            step: (exit_status != 0).then(|| "dock".to_string()),
            error: (exit_status != 0).then(|| "Docking engine failed: boom".to_string()),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.log");
        let ledger = JobLedger::open(&path).unwrap();
        ledger.append(entry("b", 0)).unwrap();
        ledger.append(entry("a", 1)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("task_id\texit_status\tstart_time"));

        let read = read_ledger(&path).unwrap();
        assert_eq!(read, ledger.entries().unwrap());
        assert_eq!(read[0].step, None);
        assert_eq!(read[1].step.as_deref(), Some("dock"));
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.log");
        JobLedger::open(&path).unwrap().append(entry("a", 1)).unwrap();
        JobLedger::open(&path).unwrap().append(entry("a", 0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("task_id").count(), 1);
        assert_eq!(read_ledger(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_summary_sorts_failed_ids() {
        let summary = summarize(&[entry("z", 1), entry("m", 0), entry("c", 1)]);
        assert_eq!(summary.dispatched, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failed_ids, vec![TaskId::from("c"), TaskId::from("z")]);
    }
}
