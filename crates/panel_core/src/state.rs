use serde::Serialize;
use shared::domain::TaskProgress;

/// Display fields mirrored from the controller. Every field starts
/// unpopulated and is only ever overwritten by an inbound event; commands
/// never write here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelState {
    pub timer_seconds: Option<u64>,
    pub num_workers: Option<u64>,
    pub in_process: Option<bool>,
    /// One-based display value; the wire carries it zero-based.
    pub scheduler_interval: Option<u64>,
    pub pause_timer: Option<bool>,
    pub verbose_log: Option<bool>,
    pub save_json_db: Option<bool>,
    pub save_json_file: Option<bool>,
    pub tasks: Vec<TaskProgress>,
}

impl PanelState {
    /// Replace the record with a matching id, or append a new one.
    /// First-insertion order is preserved across updates.
    pub fn upsert_task(&mut self, task: TaskProgress) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *existing = task;
        } else {
            self.tasks.push(task);
        }
    }

    pub fn formatted_timer(&self) -> Option<String> {
        self.timer_seconds.map(format_elapsed)
    }
}

/// `HH:MM:SS`, each component zero-padded to a minimum of two digits.
/// Hours widen past two digits instead of wrapping.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
