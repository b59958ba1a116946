use serde::{Deserialize, Serialize};

/// Identifier a task is keyed by in the controller's task list. The
/// controller uses the scrape target name, so this is a string rather
/// than a numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

/// Per-task progress record as pushed by the controller. The progress
/// string is opaque display text ("done/total"); the panel never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub id: TaskId,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

impl TaskProgress {
    pub fn new(id: impl Into<String>, progress: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id),
            progress: Some(progress.into()),
        }
    }
}
