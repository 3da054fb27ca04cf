//! Task identity and lifecycle.
//!
//! A task id is the item's path relative to the input root, extension stripped,
//! with every separator replaced by [`FLATTEN_CHAR`]. The mapping is textual, so
//! `a/b.sdf` and `a_b.sdf` both flatten to `a_b`. [`TaskSet::from_paths`] detects
//! that case and rejects the whole set, because per-task output directories are
//! keyed by id and must stay disjoint.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FerrodockError, Result};

/// Character substituted for path separators when flattening.
pub const FLATTEN_CHAR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// `path` without `.` components, so `./ligs/a.sdf` and `ligs/a.sdf` compare equal.
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Derive the flat identifier of `item` relative to `root`.
pub fn derive_task_id(item: &Path, root: &Path) -> Result<TaskId> {
    let (item_norm, root_norm) = (without_cur_dir(item), without_cur_dir(root));
    let relative = item_norm.strip_prefix(&root_norm).map_err(|_| {
        FerrodockError::Config(format!(
            "{} is not under input root {}",
            item.display(),
            root.display()
        ))
    })?;

    let stem = relative.with_extension("");
    let segments: Vec<String> = stem
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(FerrodockError::Config(format!(
            "cannot derive a task id from {}",
            item.display()
        )));
    }

    Ok(TaskId(segments.join(&FLATTEN_CHAR.to_string())))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Skipped,
    Success,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Skipped | TaskState::Success | TaskState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub source_path: PathBuf,
    pub state: TaskState,
}

impl Task {
    pub fn new(id: TaskId, source_path: PathBuf) -> Self {
        Self {
            id,
            source_path,
            state: TaskState::Pending,
        }
    }
}

/// Tasks of one run, ordered by id, with unique ids guaranteed.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    /// Build the task set for `items` under `root`.
    ///
    /// Fails with [`FerrodockError::IdCollision`] when two distinct paths share an id.
    pub fn from_paths<I>(root: &Path, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut by_id: BTreeMap<TaskId, PathBuf> = BTreeMap::new();

        for item in items {
            let id = derive_task_id(&item, root)?;
            if let Some(existing) = by_id.get(&id) {
                if existing != &item {
                    let (first, second) = if existing < &item {
                        (existing.clone(), item)
                    } else {
                        (item, existing.clone())
                    };
                    return Err(FerrodockError::IdCollision {
                        id: id.to_string(),
                        first,
                        second,
                    });
                }
                continue;
            }
            by_id.insert(id, item);
        }

        let tasks = by_id
            .into_iter()
            .map(|(id, path)| Task::new(id, path))
            .collect();
        Ok(Self { tasks })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}
