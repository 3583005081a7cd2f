//! Batch task and status types.

use serde::Serialize;

use crate::error::DeclineError;

/// Boxed unit of work executed by the orchestrator.
pub type TaskAction<T> = Box<dyn FnOnce() -> Result<T, DeclineError> + Send>;

/// One queued unit of work.
pub struct Task<T> {
    pub id: String,
    pub description: String,
    pub action: TaskAction<T>,
    /// When false, a failure of this task halts the rest of the batch.
    pub continue_on_error: bool,
}

impl<T> Task<T> {
    /// A task that lets the batch continue if it fails.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        action: impl FnOnce() -> Result<T, DeclineError> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action: Box::new(action),
            continue_on_error: true,
        }
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("continue_on_error", &self.continue_on_error)
            .finish()
    }
}

/// Orchestrator lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
    /// Halted by a failing task with `continue_on_error = false`.
    Failed,
}

impl BatchPhase {
    /// Running or paused: a batch run is in progress.
    pub fn is_active(self) -> bool {
        matches!(self, BatchPhase::Running | BatchPhase::Paused)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSuccess<T> {
    pub id: String,
    pub data: T,
}

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub id: String,
    pub error: DeclineError,
}

/// Snapshot of a batch run, as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct BatchStatus<T> {
    pub phase: BatchPhase,
    pub is_processing: bool,
    pub is_paused: bool,
    /// Percentage of tasks processed, `0..=100`.
    pub progress: f64,
    pub results: Vec<TaskSuccess<T>>,
    pub errors: Vec<TaskFailure>,
    /// Description of the task in flight (empty between runs).
    pub current_task: String,
    /// Ids of tasks not yet started.
    pub pending: Vec<String>,
    pub total: usize,
    pub processed: usize,
}

impl<T> Default for BatchStatus<T> {
    fn default() -> Self {
        Self {
            phase: BatchPhase::Idle,
            is_processing: false,
            is_paused: false,
            progress: 0.0,
            results: Vec::new(),
            errors: Vec::new(),
            current_task: String::new(),
            pending: Vec::new(),
            total: 0,
            processed: 0,
        }
    }
}

impl<T> BatchStatus<T> {
    pub(crate) fn update_progress(&mut self) {
        self.progress = if self.total == 0 {
            100.0
        } else {
            100.0 * self.processed as f64 / self.total as f64
        };
    }
}
