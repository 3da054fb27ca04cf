//! Per-task completion checkpoints.
//!
//! Under [`CompletionRule::Marker`] a task is complete only once its `.done`
//! marker has been written, which happens after every pipeline step succeeded.
//! The marker records a SHA-256 digest of the source item so an edited item
//! is docked again on resume.

use std::path::Path;

use chrono::{DateTime, Utc};
use ferrodock_common::{CompletionRule, Result, RunLayout, TaskId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub task_id: TaskId,
    pub completed_at: DateTime<Utc>,
    pub source_digest: String,
}

pub struct CheckpointStore {
    layout: RunLayout,
    rule: CompletionRule,
}

impl CheckpointStore {
    pub fn new(layout: RunLayout, rule: CompletionRule) -> Self {
        Self { layout, rule }
    }

    pub fn rule(&self) -> CompletionRule {
        self.rule
    }

    /// Whether `id` finished in an earlier run. `digest` is the current
    /// digest of the source item; when given, a marker recorded for a
    /// different digest does not count.
    pub async fn is_complete(&self, id: &TaskId, digest: Option<&str>) -> bool {
        match self.rule {
            CompletionRule::Marker => match self.read_marker(id).await {
                Some(marker) => match digest {
                    Some(current) if current != marker.source_digest => {
                        debug!(task_id = %id, "Source changed since last run");
                        false
                    }
                    _ => true,
                },
                None => false,
            },
            CompletionRule::NonEmptyDirectory => {
                let dir = self.layout.task_dir(id);
                match tokio::fs::read_dir(&dir).await {
                    Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
                    Err(_) => false,
                }
            }
        }
    }

    async fn read_marker(&self, id: &TaskId) -> Option<CompletionMarker> {
        let path = self.layout.done_marker(id);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str::<CompletionMarker>(&content) {
            Ok(marker) if &marker.task_id == id => Some(marker),
            Ok(_) => {
                warn!("Marker {:?} belongs to another task, ignoring", path);
                None
            }
            Err(e) => {
                warn!("Unreadable marker {:?}: {}", path, e);
                None
            }
        }
    }

    /// Create the task's output directory.
    pub async fn reserve(&self, id: &TaskId) -> Result<()> {
        tokio::fs::create_dir_all(self.layout.task_dir(id)).await?;
        Ok(())
    }

    /// Remove whatever an earlier, incomplete attempt left behind.
    pub async fn clear(&self, id: &TaskId) -> Result<()> {
        let dir = self.layout.task_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(task_id = %id, "Cleared stale output");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the `.done` marker through a temporary file and a rename, so a
    /// reader never sees a partial marker.
    pub async fn mark_complete(&self, id: &TaskId, source_digest: &str) -> Result<()> {
        let marker = CompletionMarker {
            task_id: id.clone(),
            completed_at: Utc::now(),
            source_digest: source_digest.to_string(),
        };
        let path = self.layout.done_marker(id);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&marker)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Hex SHA-256 of the file at `path`.
pub async fn source_digest(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
