//! Findings and the final run report
//!
//! Findings are never stored: the report builder recomputes them from the
//! registry's completed tasks every time it runs, using the extraction rule
//! registered for each task's tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Task, TaskId, TaskRegistry, TaskStatus};

/// A human-readable fact derived from a completed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub task_id: TaskId,
    pub tool: String,
    pub target: String,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Tool-specific mapping from a result payload to findings
pub trait FindingRule: Send + Sync {
    fn extract(&self, task: &Task, result: &Value) -> Vec<Finding>;
}

/// Reads an `open_ports` list; one finding per port
#[derive(Debug, Clone, Copy, Default)]
pub struct PortScanRule;

impl FindingRule for PortScanRule {
    fn extract(&self, task: &Task, result: &Value) -> Vec<Finding> {
        list_entries(result, "open_ports", &["port"])
            .into_iter()
            .map(|port| finding(task, format!("Port {} is open on {}", port, task.target())))
            .collect()
    }
}

/// Reads a `discovered_paths` list; one finding per path
#[derive(Debug, Clone, Copy, Default)]
pub struct PathDiscoveryRule;

impl FindingRule for PathDiscoveryRule {
    fn extract(&self, task: &Task, result: &Value) -> Vec<Finding> {
        list_entries(result, "discovered_paths", &["path", "url"])
            .into_iter()
            .map(|path| finding(task, format!("Directory {} found on {}", path, task.target())))
            .collect()
    }
}

fn finding(task: &Task, message: String) -> Finding {
    Finding {
        task_id: task.id,
        tool: task.tool.clone(),
        target: task.target().to_string(),
        message,
    }
}

/// Render each entry of `result[key]`; objects are read through `fields`
fn list_entries(result: &Value, key: &str, fields: &[&str]) -> Vec<String> {
    let Some(entries) = result.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(map) => fields
                .iter()
                .find_map(|f| map.get(*f))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}

/// Extraction rules keyed by tool name
#[derive(Clone, Default)]
pub struct FindingRules {
    rules: HashMap<String, Arc<dyn FindingRule>>,
}

impl FindingRules {
    /// No rules; every tool yields zero findings
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in rules for the stock port-scan and discovery tools
    pub fn with_defaults() -> Self {
        let mut rules = Self::empty();
        rules.register("nmap", Arc::new(PortScanRule));
        rules.register("gobuster", Arc::new(PathDiscoveryRule));
        rules.register("ffuf", Arc::new(PathDiscoveryRule));
        rules
    }

    pub fn register(&mut self, tool: &str, rule: Arc<dyn FindingRule>) {
        self.rules.insert(tool.to_string(), rule);
    }

    pub fn get(&self, tool: &str) -> Option<&Arc<dyn FindingRule>> {
        self.rules.get(tool)
    }
}

impl fmt::Debug for FindingRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tools: Vec<_> = self.rules.keys().collect();
        tools.sort();
        f.debug_struct("FindingRules").field("tools", &tools).finish()
    }
}

/// Aggregate counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub total_findings: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks ({} completed, {} failed), {} findings",
            self.total_tasks, self.completed_tasks, self.failed_tasks, self.total_findings
        )
    }
}

/// Final output of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub findings: Vec<String>,
    pub summary: RunSummary,
}

/// Builds reports from the registry's current contents
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    rules: FindingRules,
}

impl ReportBuilder {
    pub fn new(rules: FindingRules) -> Self {
        Self { rules }
    }

    /// Extract every finding, in task creation order
    pub fn findings(&self, registry: &TaskRegistry) -> Vec<Finding> {
        registry
            .all()
            .iter()
            .flat_map(|task| self.task_findings(task))
            .collect()
    }

    /// Findings for a single task; empty unless it completed with a result
    pub fn task_findings(&self, task: &Task) -> Vec<Finding> {
        if task.status != TaskStatus::Completed {
            return Vec::new();
        }
        let Some(result) = task.result.as_ref().filter(|r| !is_empty_payload(r)) else {
            return Vec::new();
        };
        self.rules
            .get(&task.tool)
            .map(|rule| rule.extract(task, result))
            .unwrap_or_default()
    }

    /// Build the report.
    ///
    /// Tasks still `Pending` or `Running` count toward `total_tasks` only.
    pub fn build(&self, registry: &TaskRegistry) -> Report {
        let findings: Vec<String> = self
            .findings(registry)
            .into_iter()
            .map(|f| f.message)
            .collect();

        let summary = RunSummary {
            total_tasks: registry.len(),
            completed_tasks: registry.count(TaskStatus::Completed),
            failed_tasks: registry.count(TaskStatus::Failed),
            total_findings: findings.len(),
        };

        Report { findings, summary }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(FindingRules::with_defaults())
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parameters, TARGET_PARAM};
    use serde_json::json;

    fn params(target: &str) -> Parameters {
        Parameters::from([(TARGET_PARAM.to_string(), target.to_string())])
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();

        let nmap = registry.add("Port scan", "nmap", params("example.com"));
        assert!(registry
            .complete(nmap.id, json!({"open_ports": [80, 443]}))
            .is_applied());

        let gobuster = registry.add("Dir scan", "gobuster", params("www.example.com"));
        assert!(registry
            .complete(gobuster.id, json!({"discovered_paths": ["/admin", {"path": "/login"}]}))
            .is_applied());

        let failed = registry.add("Broken", "ffuf", params("example.com"));
        assert!(registry.mark_running(failed.id).is_applied());
        assert!(registry.fail_permanently(failed.id, "missing wordlist").is_applied());

        registry.add("Still queued", "nmap", params("192.168.1.1"));
        registry
    }

    #[test]
    fn test_build_report() {
        let report = ReportBuilder::default().build(&registry());

        assert_eq!(
            report.findings,
            vec![
                "Port 80 is open on example.com",
                "Port 443 is open on example.com",
                "Directory /admin found on www.example.com",
                "Directory /login found on www.example.com",
            ]
        );
        assert_eq!(
            report.summary,
            RunSummary {
                total_tasks: 4,
                completed_tasks: 2,
                failed_tasks: 1,
                total_findings: 4,
            }
        );
    }

    #[test]
    fn test_running_task_counts_only_toward_total() {
        let mut registry = TaskRegistry::new();
        let done = registry.add("Port scan", "nmap", params("example.com"));
        assert!(registry.complete(done.id, json!({"open_ports": [22]})).is_applied());
        let running = registry.add("In flight", "nmap", params("www.example.com"));
        assert!(registry.mark_running(running.id).is_applied());

        let builder = ReportBuilder::default();
        assert!(builder.task_findings(registry.get(running.id).unwrap()).is_empty());
        assert_eq!(builder.task_findings(registry.get(done.id).unwrap()).len(), 1);

        let report = builder.build(&registry);
        assert_eq!(
            report.summary,
            RunSummary {
                total_tasks: 2,
                completed_tasks: 1,
                failed_tasks: 0,
                total_findings: 1,
            }
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let registry = registry();
        let builder = ReportBuilder::default();
        assert_eq!(builder.build(&registry), builder.build(&registry));
    }

    #[test]
    fn test_unknown_tool_yields_no_findings() {
        let mut registry = TaskRegistry::new();
        let task = registry.add("Custom", "masscan", params("example.com"));
        assert!(registry
            .complete(task.id, json!({"open_ports": [22]}))
            .is_applied());

        let report = ReportBuilder::default().build(&registry);
        assert!(report.findings.is_empty());
        assert_eq!(report.summary.completed_tasks, 1);
    }

    #[test]
    fn test_empty_or_mismatched_payloads() {
        let mut registry = TaskRegistry::new();
        let empty = registry.add("a", "nmap", params("example.com"));
        assert!(registry.complete(empty.id, json!({})).is_applied());
        let wrong = registry.add("b", "nmap", params("example.com"));
        assert!(registry
            .complete(wrong.id, json!({"discovered_paths": ["/x"]}))
            .is_applied());

        let report = ReportBuilder::default().build(&registry);
        assert_eq!(report.summary.total_findings, 0);
    }

    #[test]
    fn test_custom_rule_registration() {
        struct BannerRule;
        impl FindingRule for BannerRule {
            fn extract(&self, task: &Task, result: &Value) -> Vec<Finding> {
                result["banner"]
                    .as_str()
                    .map(|b| vec![finding(task, format!("Banner {}", b))])
                    .unwrap_or_default()
            }
        }

        let mut rules = FindingRules::with_defaults();
        rules.register("banner-grab", Arc::new(BannerRule));

        let mut registry = TaskRegistry::new();
        let task = registry.add("grab", "banner-grab", params("example.com"));
        assert!(registry
            .complete(task.id, json!({"banner": "OpenSSH_9.6"}))
            .is_applied());

        let findings = ReportBuilder::new(rules).findings(&registry);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].to_string(), "Banner OpenSSH_9.6");
        assert_eq!(findings[0].task_id, task.id);
    }
}
