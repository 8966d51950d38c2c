//! Audit sink
//!
//! Components receive an [`AuditSink`] explicitly instead of reaching for a
//! global logger. Every method is fire-and-forget: sinks must not fail and
//! nothing they do feeds back into control flow.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{Finding, Parameters, RunSummary, TaskId, TaskStatus};

/// Receiver for run audit events
pub trait AuditSink: Send + Sync {
    fn run_started(&self, _instruction: &str) {}

    /// A proposal was dropped because its target is out of scope
    fn scope_violation(&self, _target: &str) {}

    fn tool_start(&self, _task_id: TaskId, _tool: &str, _parameters: &Parameters) {}

    fn tool_complete(&self, _task_id: TaskId, _tool: &str, _payload: &Value) {}

    fn tool_error(&self, _task_id: TaskId, _tool: &str, _error: &str) {}

    fn task_update(&self, _task_id: TaskId, _status: TaskStatus) {}

    /// A completed task produced a finding
    fn vulnerability_found(&self, _finding: &Finding) {}

    /// An update referenced a task the registry does not hold, or was refused
    fn registry_inconsistency(&self, _task_id: TaskId, _detail: &str) {}

    fn run_summary(&self, _summary: &RunSummary) {}
}

/// Thread-safe reference to an audit sink
pub type SharedAudit = Arc<dyn AuditSink>;

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudit;

impl AuditSink for NullAudit {}

/// Writes audit events through `tracing`, tagged with the run id
#[derive(Debug, Clone)]
pub struct TracingAudit {
    run_id: Uuid,
}

impl TracingAudit {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Default for TracingAudit {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for TracingAudit {
    fn run_started(&self, instruction: &str) {
        info!(run_id = %self.run_id, "Starting assessment: {}", instruction);
    }

    fn scope_violation(&self, target: &str) {
        warn!(run_id = %self.run_id, "Attempted scan on out-of-scope target: {}", target);
    }

    fn tool_start(&self, task_id: TaskId, tool: &str, parameters: &Parameters) {
        info!(run_id = %self.run_id, %task_id, "Starting {} with parameters: {:?}", tool, parameters);
    }

    fn tool_complete(&self, task_id: TaskId, tool: &str, payload: &Value) {
        info!(run_id = %self.run_id, %task_id, "Completed {} successfully", tool);
        debug!(run_id = %self.run_id, %task_id, "{} result: {}", tool, payload);
    }

    fn tool_error(&self, task_id: TaskId, tool: &str, error: &str) {
        error!(run_id = %self.run_id, %task_id, "Error in {}: {}", tool, error);
    }

    fn task_update(&self, task_id: TaskId, status: TaskStatus) {
        info!(run_id = %self.run_id, "Task {} status updated to: {}", task_id, status);
    }

    fn vulnerability_found(&self, finding: &Finding) {
        warn!(
            run_id = %self.run_id,
            task_id = %finding.task_id,
            "Vulnerability found by {}: {}",
            finding.tool,
            finding.message
        );
    }

    fn registry_inconsistency(&self, task_id: TaskId, detail: &str) {
        warn!(run_id = %self.run_id, "Registry update for {} ignored: {}", task_id, detail);
    }

    fn run_summary(&self, summary: &RunSummary) {
        info!(run_id = %self.run_id, "Run summary: {}", summary);
    }
}
