//! Planner proposals and planning context
//!
//! A proposal is an unvalidated candidate task. It only becomes a [`Task`]
//! after its target passes scope admission.
//!
//! [`Task`]: crate::Task

use serde::{Deserialize, Serialize};

use crate::{Parameters, Task, TaskId, TARGET_PARAM};

/// Candidate task emitted by a planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub tool: String,
    pub target: String,
    pub description: String,
    /// Extra tool parameters (never contains a `target` that differs from `target`)
    #[serde(default)]
    pub parameters: Parameters,
}

impl Proposal {
    pub fn new(tool: &str, target: &str, description: &str) -> Self {
        Self {
            tool: tool.to_string(),
            target: target.to_string(),
            description: description.to_string(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.parameters.insert(key.to_string(), value.to_string());
        self
    }

    /// Full parameter map for task creation, with `target` merged in
    pub fn task_parameters(&self) -> Parameters {
        let mut parameters = self.parameters.clone();
        parameters.insert(TARGET_PARAM.to_string(), self.target.clone());
        parameters
    }
}

/// A successful task outcome handed back to the planner for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub tool: String,
    pub target: String,
    pub payload: serde_json::Value,
}

impl TaskResult {
    /// Snapshot a completed task; `None` if it carries no result
    pub fn from_task(task: &Task) -> Option<Self> {
        task.result.as_ref().map(|payload| Self {
            task_id: task.id,
            tool: task.tool.clone(),
            target: task.target().to_string(),
            payload: payload.clone(),
        })
    }
}

/// What the planner is asked to plan from
#[derive(Debug, Clone)]
pub enum PlanContext {
    /// First round: the operator's free-text instruction
    Instruction(String),
    /// Later rounds: every successful result accumulated so far
    Results(Vec<TaskResult>),
}

impl PlanContext {
    pub fn is_initial(&self) -> bool {
        matches!(self, PlanContext::Instruction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskRegistry;

    #[test]
    fn test_task_parameters_include_target() {
        let proposal = Proposal::new("gobuster", "example.com", "dir scan")
            .with_param("wordlist", "/tmp/words.txt");
        let params = proposal.task_parameters();
        assert_eq!(params.get("target").map(String::as_str), Some("example.com"));
        assert_eq!(params.get("wordlist").map(String::as_str), Some("/tmp/words.txt"));
    }

    #[test]
    fn test_task_result_from_task() {
        let mut registry = TaskRegistry::new();
        let proposal = Proposal::new("nmap", "example.com", "port scan");
        let task = registry.add(&proposal.description, &proposal.tool, proposal.task_parameters());
        assert!(TaskResult::from_task(&task).is_none());

        assert!(registry
            .complete(task.id, serde_json::json!({"open_ports": [80]}))
            .is_applied());
        let result = TaskResult::from_task(registry.get(task.id).unwrap()).unwrap();
        assert_eq!(result.target, "example.com");
        assert_eq!(result.tool, "nmap");
    }
}
