//! Tasks and the in-memory task registry
//!
//! The registry is the single source of truth for task identity, status and
//! results during one run:
//! - Tasks are appended in creation order and never removed
//! - Ids are monotonically increasing, so ordering by id is creation order
//! - Status changes follow the lifecycle state machine
//!   `Pending -> Running -> {Completed | Failed}` with `Running -> Pending`
//!   when a failed attempt still has retries left

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{DEFAULT_RETRY_LIMIT, TARGET_PARAM};

/// Tool parameters (key -> value), always carrying a `target` entry
pub type Parameters = BTreeMap<String, String>;

/// Registry-unique task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{:04}", self.0)
    }
}

/// Lifecycle states of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Completed | TaskStatus::Failed, _) => false,
            (TaskStatus::Running, TaskStatus::Running) => false,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of planned work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Immutable identifier assigned at creation
    pub id: TaskId,

    /// Human-readable description from the planner
    pub description: String,

    /// Capability selector (e.g. "nmap")
    pub tool: String,

    /// Tool parameters, including `target`
    pub parameters: Parameters,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Failed attempts so far
    pub retries: u32,

    /// Failed attempts allowed before the task is failed for good
    pub retry_limit: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Structured payload produced by the tool on success
    pub result: Option<serde_json::Value>,

    /// Cause of the most recent failed attempt
    pub last_error: Option<String>,
}

impl Task {
    /// The scope-checked target this task operates against
    pub fn target(&self) -> &str {
        self.parameters
            .get(TARGET_PARAM)
            .map(String::as_str)
            .unwrap_or_default()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Outcome of a registry status update
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new status was applied
    Applied,
    /// No task with that id exists; nothing changed
    NotFound,
    /// The state machine forbids the transition; nothing changed
    Rejected { from: TaskStatus, to: TaskStatus },
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Owns every task of a run, in creation order
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    next_id: u64,
    retry_limit: u32,
}

impl TaskRegistry {
    /// Create an empty registry using the default retry limit
    pub fn new() -> Self {
        Self::with_retry_limit(DEFAULT_RETRY_LIMIT)
    }

    /// Create an empty registry whose tasks allow `retry_limit` failed attempts
    pub fn with_retry_limit(retry_limit: u32) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            retry_limit,
        }
    }

    /// Create a new `Pending` task and append it.
    ///
    /// Tool existence is not checked here; the invoker rejects unknown tools
    /// at dispatch time.
    pub fn add(
        &mut self,
        description: impl Into<String>,
        tool: impl Into<String>,
        parameters: Parameters,
    ) -> Task {
        let now = Utc::now();
        let task = Task {
            id: TaskId(self.next_id),
            description: description.into(),
            tool: tool.into(),
            parameters,
            status: TaskStatus::Pending,
            retries: 0,
            retry_limit: self.retry_limit,
            created_at: now,
            updated_at: now,
            result: None,
            last_error: None,
        };
        self.next_id += 1;
        self.tasks.push(task.clone());
        task
    }

    /// Apply a status (and optionally a result) to a task.
    ///
    /// An unknown id is a soft no-op reported as [`UpdateOutcome::NotFound`]
    /// so stale references never abort a run. Transitions out of a terminal
    /// state are refused.
    pub fn update_status(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        result: Option<serde_json::Value>,
    ) -> UpdateOutcome {
        let Some(task) = self.get_mut(id) else {
            return UpdateOutcome::NotFound;
        };

        if !task.status.can_transition_to(status) {
            return UpdateOutcome::Rejected {
                from: task.status,
                to: status,
            };
        }

        task.status = status;
        if let Some(result) = result {
            task.result = Some(result);
        }
        task.touch();
        UpdateOutcome::Applied
    }

    /// First `Pending` task in creation order
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Pending)
    }

    /// All tasks in creation order
    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Ids of every `Pending` task, in creation order
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect()
    }

    /// Number of tasks currently in `status`
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task is being handed to the tool invoker
    pub fn mark_running(&mut self, id: TaskId) -> UpdateOutcome {
        self.update_status(id, TaskStatus::Running, None)
    }

    /// Tool returned a result
    pub fn complete(&mut self, id: TaskId, result: serde_json::Value) -> UpdateOutcome {
        self.update_status(id, TaskStatus::Completed, Some(result))
    }

    /// Record a failed attempt of a running task and apply the retry policy.
    ///
    /// Returns the resulting status: `Pending` while failed attempts stay
    /// below the task's retry limit, `Failed` once they reach it. Returns
    /// `None` if the task is unknown or not running.
    pub fn record_failure(&mut self, id: TaskId, cause: &str) -> Option<TaskStatus> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Running {
            return None;
        }

        task.retries += 1;
        task.last_error = Some(cause.to_string());
        task.status = if task.retries < task.retry_limit {
            TaskStatus::Pending
        } else {
            TaskStatus::Failed
        };
        task.touch();
        Some(task.status)
    }

    /// Fail a task without consuming a retry (structural misconfiguration)
    pub fn fail_permanently(&mut self, id: TaskId, cause: &str) -> UpdateOutcome {
        let outcome = self.update_status(id, TaskStatus::Failed, None);
        if outcome.is_applied() {
            if let Some(task) = self.get_mut(id) {
                task.last_error = Some(cause.to_string());
            }
        }
        outcome
    }

    /// Force every `Running` task to `Failed`; returns the affected ids
    pub fn abort_running(&mut self, cause: &str) -> Vec<TaskId> {
        let mut aborted = Vec::new();
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Running)
        {
            task.status = TaskStatus::Failed;
            task.last_error = Some(cause.to_string());
            task.touch();
            aborted.push(task.id);
        }
        aborted
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(target: &str) -> Parameters {
        Parameters::from([(TARGET_PARAM.to_string(), target.to_string())])
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut registry = TaskRegistry::new();
        let a = registry.add("scan a", "nmap", params("a.example.com"));
        let b = registry.add("scan b", "nmap", params("b.example.com"));
        let c = registry.add("scan c", "gobuster", params("c.example.com"));

        assert!(a.id < b.id && b.id < c.id);
        let ids: Vec<_> = registry.all().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert_eq!(a.status, TaskStatus::Pending);
        assert_eq!(a.retries, 0);
        assert_eq!(a.retry_limit, DEFAULT_RETRY_LIMIT);
        assert_eq!(a.target(), "a.example.com");
    }

    #[test]
    fn test_task_id_display() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("scan", "nmap", params("example.com"));
        assert_eq!(task.id.to_string(), "task-0001");
    }

    #[test]
    fn test_next_pending_follows_insertion_order() {
        let mut registry = TaskRegistry::new();
        let a = registry.add("a", "nmap", params("a.example.com"));
        let b = registry.add("b", "nmap", params("b.example.com"));

        assert_eq!(registry.next_pending().map(|t| t.id), Some(a.id));
        assert!(registry.mark_running(a.id).is_applied());
        assert_eq!(registry.next_pending().map(|t| t.id), Some(b.id));
        assert!(registry.mark_running(b.id).is_applied());
        assert!(registry.next_pending().is_none());
    }

    #[test]
    fn test_update_unknown_id_is_soft_noop() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("a", "nmap", params("example.com"));

        let mut other = TaskRegistry::new();
        other.add("x", "nmap", params("example.com"));
        other.add("y", "nmap", params("example.com"));
        let stale = other.all()[1].id;

        let outcome = registry.update_status(stale, TaskStatus::Completed, None);
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert_eq!(registry.get(task.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_update_attaches_result() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("a", "nmap", params("example.com"));

        let outcome = registry.update_status(
            task.id,
            TaskStatus::Completed,
            Some(serde_json::json!({"open_ports": [80, 443]})),
        );
        assert!(outcome.is_applied());

        let stored = registry.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result.as_ref().unwrap()["open_ports"][1], 443);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[test]
    fn test_terminal_states_are_closed() {
        let mut registry = TaskRegistry::new();
        let done = registry.add("a", "nmap", params("example.com"));
        let failed = registry.add("b", "nmap", params("example.com"));

        assert!(registry.complete(done.id, serde_json::json!({})).is_applied());
        assert!(registry.fail_permanently(failed.id, "unknown tool").is_applied());

        for status in [TaskStatus::Pending, TaskStatus::Running, TaskStatus::Failed] {
            assert!(matches!(
                registry.update_status(done.id, status, None),
                UpdateOutcome::Rejected { .. }
            ));
        }
        for status in [TaskStatus::Pending, TaskStatus::Running, TaskStatus::Completed] {
            assert!(matches!(
                registry.update_status(failed.id, status, None),
                UpdateOutcome::Rejected { .. }
            ));
        }
        assert_eq!(registry.record_failure(done.id, "late"), None);
        assert_eq!(registry.get(done.id).unwrap().status, TaskStatus::Completed);
        assert_eq!(registry.get(failed.id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn test_retry_bound() {
        let mut registry = TaskRegistry::with_retry_limit(3);
        let task = registry.add("a", "nmap", params("example.com"));

        let mut attempts = 0;
        loop {
            assert!(registry.mark_running(task.id).is_applied());
            attempts += 1;
            match registry.record_failure(task.id, "exit status 1") {
                Some(TaskStatus::Pending) => {
                    let t = registry.get(task.id).unwrap();
                    assert!(t.retries < t.retry_limit);
                }
                Some(TaskStatus::Failed) => break,
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        let t = registry.get(task.id).unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(t.retries, 3);
        assert_eq!(t.last_error.as_deref(), Some("exit status 1"));
    }

    #[test]
    fn test_fail_twice_then_succeed() {
        let mut registry = TaskRegistry::with_retry_limit(3);
        let task = registry.add("a", "nmap", params("example.com"));

        for _ in 0..2 {
            assert!(registry.mark_running(task.id).is_applied());
            assert_eq!(
                registry.record_failure(task.id, "timeout"),
                Some(TaskStatus::Pending)
            );
        }
        assert!(registry.mark_running(task.id).is_applied());
        assert!(registry
            .complete(task.id, serde_json::json!({"open_ports": [22]}))
            .is_applied());

        let t = registry.get(task.id).unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.retries, 2);
    }

    #[test]
    fn test_record_failure_requires_running() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("a", "nmap", params("example.com"));
        assert_eq!(registry.record_failure(task.id, "boom"), None);
        assert_eq!(registry.get(task.id).unwrap().retries, 0);
    }

    #[test]
    fn test_fail_permanently_consumes_no_retry() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("a", "sqlmap", params("example.com"));
        assert!(registry.mark_running(task.id).is_applied());
        assert!(registry.fail_permanently(task.id, "unknown tool").is_applied());

        let t = registry.get(task.id).unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.retries, 0);
    }

    #[test]
    fn test_abort_running() {
        let mut registry = TaskRegistry::new();
        let a = registry.add("a", "nmap", params("a.example.com"));
        let b = registry.add("b", "nmap", params("b.example.com"));
        assert!(registry.mark_running(a.id).is_applied());

        let aborted = registry.abort_running("cancelled");
        assert_eq!(aborted, vec![a.id]);
        assert_eq!(registry.get(a.id).unwrap().status, TaskStatus::Failed);
        assert_eq!(registry.get(b.id).unwrap().status, TaskStatus::Pending);
        assert_eq!(registry.count(TaskStatus::Running), 0);
    }
}
