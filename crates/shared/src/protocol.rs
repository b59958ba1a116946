use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{domain::TaskProgress, error::ProtocolError};

mod action {
    pub const GET_LOG: &str = "get_log";
    pub const GET_TIMER: &str = "get_timer";
    pub const GET_NUM_WORKERS: &str = "get_num_workers";
    pub const GET_PROCESS: &str = "get_process";
    pub const GET_SCHEDULER_INTERVAL: &str = "get_scheduler_interval";
    pub const GET_PAUSE_TIMER: &str = "get_pause_timer";
    pub const GET_VERBOSE_LOG: &str = "get_verbose_log";
    pub const GET_SAVE_JSON_DB: &str = "get_save_json_db";
    pub const GET_SAVE_JSON_FILE: &str = "get_save_json_file";
    pub const GET_NUM_TASK: &str = "get_num_task";

    pub const ADD_WORKER: &str = "add_worker";
    pub const REMOVE_WORKER: &str = "remove_worker";
    pub const SET_PROCESS: &str = "set_process";
    pub const SET_SCHEDULER_INTERVAL: &str = "set_scheduler_interval";
    pub const SET_PAUSE_TIMER: &str = "set_pause_timer";
    pub const SET_VERBOSE_LOG: &str = "set_verbose_log";
    pub const SET_TASKS: &str = "set_tasks";
    pub const SET_SAVE_JSON_DB: &str = "set_save_json_db";
    pub const SET_SAVE_JSON_FILE: &str = "set_save_json_file";
    pub const IMPORT_GEOS_FROM_CSV: &str = "import_geos_from_csv";
}

/// The `{action, data}` unit of communication over the panel channel, in
/// either direction. `data` stays untyped until the action is matched; a
/// missing `action` or `data` key decodes to empty / null rather than
/// failing the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }

    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|source| ProtocolError::Malformed { source })
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

/// Controller-pushed event, one variant per inbound action. The controller
/// is the source of truth for every field the panel displays; these are
/// reflections, never locally originated.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Text appended to the operator log stream.
    Log(String),
    /// Scheduler timer position, in seconds.
    Timer(u64),
    /// Current size of the worker fleet.
    NumWorkers(u64),
    /// Whether a scrape session is currently running.
    Process(bool),
    /// Scheduler interval as transmitted: zero-based.
    SchedulerInterval(u64),
    /// Whether the scheduler countdown is paused.
    PauseTimer(bool),
    /// Whether the controller forwards non-forced log lines.
    VerboseLog(bool),
    /// Whether results are persisted to the database.
    SaveJsonDb(bool),
    /// Whether results are persisted to JSON files.
    SaveJsonFile(bool),
    /// Progress snapshot for one task; `None` when the payload is null.
    NumTask(Option<TaskProgress>),
}

fn payload<T: DeserializeOwned>(action: &'static str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { action, source })
}

impl ServerEvent {
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        use action::*;
        let Envelope { action, data } = envelope;
        let event = match action.as_str() {
            GET_LOG => Self::Log(payload(GET_LOG, data)?),
            GET_TIMER => Self::Timer(payload(GET_TIMER, data)?),
            GET_NUM_WORKERS => Self::NumWorkers(payload(GET_NUM_WORKERS, data)?),
            GET_PROCESS => Self::Process(payload(GET_PROCESS, data)?),
            GET_SCHEDULER_INTERVAL => Self::SchedulerInterval(payload(GET_SCHEDULER_INTERVAL, data)?),
            GET_PAUSE_TIMER => Self::PauseTimer(payload(GET_PAUSE_TIMER, data)?),
            GET_VERBOSE_LOG => Self::VerboseLog(payload(GET_VERBOSE_LOG, data)?),
            GET_SAVE_JSON_DB => Self::SaveJsonDb(payload(GET_SAVE_JSON_DB, data)?),
            GET_SAVE_JSON_FILE => Self::SaveJsonFile(payload(GET_SAVE_JSON_FILE, data)?),
            GET_NUM_TASK => Self::NumTask(payload(GET_NUM_TASK, data)?),
            _ => return Err(ProtocolError::UnknownAction { action }),
        };
        Ok(event)
    }

    pub fn action(&self) -> &'static str {
        use action::*;
        match self {
            Self::Log(_) => GET_LOG,
            Self::Timer(_) => GET_TIMER,
            Self::NumWorkers(_) => GET_NUM_WORKERS,
            Self::Process(_) => GET_PROCESS,
            Self::SchedulerInterval(_) => GET_SCHEDULER_INTERVAL,
            Self::PauseTimer(_) => GET_PAUSE_TIMER,
            Self::VerboseLog(_) => GET_VERBOSE_LOG,
            Self::SaveJsonDb(_) => GET_SAVE_JSON_DB,
            Self::SaveJsonFile(_) => GET_SAVE_JSON_FILE,
            Self::NumTask(_) => GET_NUM_TASK,
        }
    }

    /// Envelope form, used by controller-side code (mock controllers in
    /// tests included) to push events to panels.
    pub fn into_envelope(self) -> Envelope {
        let action = self.action();
        let data = match self {
            Self::Log(message) => json!(message),
            Self::Timer(seconds) => json!(seconds),
            Self::NumWorkers(count) => json!(count),
            Self::Process(flag)
            | Self::PauseTimer(flag)
            | Self::VerboseLog(flag)
            | Self::SaveJsonDb(flag)
            | Self::SaveJsonFile(flag) => json!(flag),
            Self::SchedulerInterval(interval) => json!(interval),
            Self::NumTask(task) => serde_json::to_value(task).unwrap_or(Value::Null),
        };
        Envelope::new(action, data)
    }
}

/// Operator command, one variant per outbound action. Commands are
/// fire-and-forget: sending one never mutates local panel state; the new
/// value arrives back as the corresponding `get_*` event, or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddWorker,
    RemoveWorker,
    SetProcess { reset_session: bool },
    SetSchedulerInterval { interval: u64 },
    SetPauseTimer,
    SetVerboseLog,
    SetTasks,
    SetSaveJsonDb,
    SetSaveJsonFile,
    ImportGeosFromCsv,
}

impl Command {
    pub fn action(&self) -> &'static str {
        use action::*;
        match self {
            Self::AddWorker => ADD_WORKER,
            Self::RemoveWorker => REMOVE_WORKER,
            Self::SetProcess { .. } => SET_PROCESS,
            Self::SetSchedulerInterval { .. } => SET_SCHEDULER_INTERVAL,
            Self::SetPauseTimer => SET_PAUSE_TIMER,
            Self::SetVerboseLog => SET_VERBOSE_LOG,
            Self::SetTasks => SET_TASKS,
            Self::SetSaveJsonDb => SET_SAVE_JSON_DB,
            Self::SetSaveJsonFile => SET_SAVE_JSON_FILE,
            Self::ImportGeosFromCsv => IMPORT_GEOS_FROM_CSV,
        }
    }

    pub fn into_envelope(self) -> Envelope {
        let data = match self {
            Self::SetProcess { reset_session } => json!(reset_session),
            Self::SetSchedulerInterval { interval } => json!(interval),
            _ => Value::Null,
        };
        Envelope::new(self.action(), data)
    }

    pub fn to_text(self) -> Result<String, ProtocolError> {
        self.into_envelope().to_text()
    }
}
