//! Run state store
//!
//! A `Run` is created the moment execution begins and persists after
//! completion as an audit record, independent of the process that
//! created it. Status transitions are monotonic toward a terminal
//! state; the log is append-only.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::workflow::{RunConfig, Workflow};

/// Run lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Log entry categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Progress,
    Success,
    Error,
    Info,
}

/// One append-only log record; never edited or removed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            metrics: None,
        }
    }

    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_metrics(mut self, metrics: Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Persisted record of one execution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub workflow: Workflow,
    pub config: RunConfig,
    pub status: RunStatus,
    pub logs: Vec<LogEntry>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcribed_text: Option<String>,
}

impl Run {
    /// Create a pending run from a workflow snapshot
    pub fn new(workflow: Workflow, config: RunConfig) -> Self {
        let transcribed_text = config.transcribed_text.clone();
        Self {
            id: Uuid::new_v4().to_string(),
            workflow,
            config,
            status: RunStatus::Pending,
            logs: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            error: None,
            transcribed_text,
        }
    }

    /// Wall-clock duration, once the run has ended
    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

/// Repository boundary for run records.
///
/// Implementations must support concurrent appends from parallel node
/// completions within a layer; global order across parallel nodes is
/// not guaranteed, per-node order is.
pub trait RunStore: Send + Sync {
    /// Persist a new run record
    fn create(&self, run: Run);

    /// Fetch one run by id
    fn get(&self, id: &str) -> Option<Run>;

    /// All runs, newest first
    fn get_all(&self) -> Vec<Run>;

    /// Transition a run's status. Moving out of a terminal state is
    /// rejected and only logged as a warning, guarding against
    /// duplicate or out-of-order delivery notifications.
    fn update_status(&self, id: &str, status: RunStatus);

    /// Append a log entry
    fn append_log(&self, id: &str, entry: LogEntry);

    /// Terminal transition with optional error message
    fn finish(&self, id: &str, status: RunStatus, error: Option<String>);
}

/// In-memory store backed by a concurrent map
#[derive(Clone, Default)]
pub struct MemoryRunStore {
    runs: std::sync::Arc<DashMap<String, Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn create(&self, run: Run) {
        self.runs.insert(run.id.clone(), run);
    }

    fn get(&self, id: &str) -> Option<Run> {
        self.runs.get(id).map(|r| r.clone())
    }

    fn get_all(&self) -> Vec<Run> {
        let mut runs: Vec<Run> = self.runs.iter().map(|r| r.clone()).collect();
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        runs
    }

    fn update_status(&self, id: &str, status: RunStatus) {
        if let Some(mut run) = self.runs.get_mut(id) {
            if run.status.is_terminal() && !status.is_terminal() {
                warn!(
                    run_id = %id,
                    current = ?run.status,
                    requested = ?status,
                    "rejected status regression from terminal state"
                );
                return;
            }
            run.status = status;
        }
    }

    fn append_log(&self, id: &str, entry: LogEntry) {
        if let Some(mut run) = self.runs.get_mut(id) {
            run.logs.push(entry);
        }
    }

    fn finish(&self, id: &str, status: RunStatus, error: Option<String>) {
        if let Some(mut run) = self.runs.get_mut(id) {
            if run.status.is_terminal() {
                warn!(run_id = %id, current = ?run.status, "run already finished");
                return;
            }
            run.status = status;
            run.end_time = Some(Utc::now());
            run.error = error;
        }
    }
}
