//! Run and task reports
//!
//! Reports are the pipeline's only output besides the database rows:
//! structured, serializable, and complete enough to diagnose a run
//! after the fact without re-running it.

use serde::Serialize;

/// Lifecycle of one task inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::PartiallyFailed => "partially_failed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// What went wrong with one item.
///
/// `DataUnavailable` is listed for completeness but a quiet window is a
/// valid outcome, not a failure; items without data succeed with no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataUnavailable,
    InvalidReference,
    PersistenceFailure,
    PolicyMisconfiguration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::PolicyMisconfiguration => "policy_misconfiguration",
        }
    }

    /// Transient failures are worth one retry; reference and policy
    /// errors will fail identically the second time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::PersistenceFailure)
    }
}

/// One failed item inside a task
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub item_id: i64,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one pipeline task
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub status: TaskStatus,
    /// Items attempted (succeeded + failed)
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Task-specific notable outcomes: fake verdicts, alerts fired
    pub flagged: usize,
    pub elapsed_ms: u64,
    /// Item errors, capped at the configured limit
    pub errors: Vec<ItemError>,
}

impl TaskReport {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            status: TaskStatus::Pending,
            processed: 0,
            succeeded: 0,
            failed: 0,
            flagged: 0,
            elapsed_ms: 0,
            errors: Vec::new(),
        }
    }

    /// Task-fatal failure (e.g. item enumeration failed before fan-out)
    pub fn failed(task: &str, message: String, elapsed_ms: u64) -> Self {
        let mut report = Self::new(task);
        report.status = TaskStatus::Failed;
        report.elapsed_ms = elapsed_ms;
        report.errors.push(ItemError {
            item_id: 0,
            kind: ErrorKind::PersistenceFailure,
            message,
        });
        report
    }

    /// Derive the final status from the item tallies. An empty batch is a
    /// success: there was nothing to do and nothing went wrong.
    pub fn finish(&mut self, elapsed_ms: u64) {
        self.processed = self.succeeded + self.failed;
        self.elapsed_ms = elapsed_ms;
        self.status = if self.failed == 0 {
            TaskStatus::Succeeded
        } else if self.succeeded > 0 {
            TaskStatus::PartiallyFailed
        } else {
            TaskStatus::Failed
        };
    }

    pub fn push_error(&mut self, error: ItemError, cap: usize) {
        if self.errors.len() < cap {
            self.errors.push(error);
        }
    }
}

/// Outcome of one full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: i64,
    pub completed_at: i64,
    pub duration_ms: u64,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn from_tasks(started_at: i64, completed_at: i64, duration_ms: u64, tasks: Vec<TaskReport>) -> Self {
        let successful = tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Succeeded | TaskStatus::PartiallyFailed))
            .count();
        Self {
            started_at,
            completed_at,
            duration_ms,
            total_tasks: tasks.len(),
            successful_tasks: successful,
            failed_tasks: tasks.len() - successful,
            tasks,
        }
    }
}
