use serde::{Deserialize, Serialize};

/// A single stored task. Identity is the full `(task, task_date)` pair;
/// there is no surrogate key, and duplicate pairs are indistinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: String,

    /// Date text in the canonical `YYYY-MM-DD` form. Stored verbatim:
    /// a string that is not a real date still partitions by its literal
    /// lexicographic value.
    #[serde(rename = "taskDate")]
    pub task_date: String,
}

impl TaskRecord {
    pub fn new(task: impl Into<String>, task_date: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            task_date: task_date.into(),
        }
    }
}
