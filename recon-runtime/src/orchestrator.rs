//! Orchestrator
//!
//! Owns the task registry for one assessment and runs rounds until the
//! planner stops proposing work and no retries remain.

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use recon_agents::{PlannerError, SharedPlanner};
use recon_core::{
    PlanContext, Proposal, Report, ReportBuilder, ScopeDefinition, SharedAudit, TaskId,
    TaskRegistry, TaskResult, TaskStatus, TracingAudit, UpdateOutcome, DEFAULT_RETRY_LIMIT,
    TARGET_PARAM,
};
use recon_tools::ToolInvoker;

const CANCELLED_CAUSE: &str = "cancelled by operator";

/// Orchestration errors. Per-task failures never surface here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Planner failed: {0}")]
    Planner(#[from] PlannerError),

    #[error("Run cancelled")]
    Cancelled,
}

/// Orchestrator configuration
pub struct OrchestratorConfig {
    pub planner: SharedPlanner,
    pub tools: ToolInvoker,
    pub scope: Arc<ScopeDefinition>,
    pub audit: SharedAudit,
    pub report: ReportBuilder,
    /// Upper bound on dispatch rounds
    pub max_rounds: usize,
    /// Wall-clock budget, checked at round boundaries
    pub max_runtime: Option<Duration>,
    /// Tool invocations allowed in flight at once (1 = sequential)
    pub max_concurrent: usize,
    /// Failed attempts a task may accumulate
    pub retry_limit: u32,
    pub cancel: CancellationToken,
}

impl OrchestratorConfig {
    /// Configuration with default bounds, tracing audit and built-in finding rules
    pub fn new(planner: SharedPlanner, tools: ToolInvoker, scope: ScopeDefinition) -> Self {
        Self {
            planner,
            tools,
            scope: Arc::new(scope),
            audit: Arc::new(TracingAudit::new()),
            report: ReportBuilder::default(),
            max_rounds: 10,
            max_runtime: None,
            max_concurrent: 1,
            retry_limit: DEFAULT_RETRY_LIMIT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// How a single dispatched task ended up
enum TaskOutcome {
    Completed(TaskResult),
    Retrying,
    Failed,
    Cancelled,
    Skipped,
}

/// Round-based task orchestrator
pub struct Orchestrator {
    planner: SharedPlanner,
    tools: Arc<ToolInvoker>,
    scope: Arc<ScopeDefinition>,
    audit: SharedAudit,
    report: ReportBuilder,
    max_rounds: usize,
    max_runtime: Option<Duration>,
    max_concurrent: usize,
    cancel: CancellationToken,
    registry: Arc<Mutex<TaskRegistry>>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            planner: config.planner,
            tools: Arc::new(config.tools),
            scope: config.scope,
            audit: config.audit,
            report: config.report,
            max_rounds: config.max_rounds,
            max_runtime: config.max_runtime,
            max_concurrent: config.max_concurrent.max(1),
            cancel: config.cancel,
            registry: Arc::new(Mutex::new(TaskRegistry::with_retry_limit(config.retry_limit))),
        }
    }

    /// Token that cancels the run when triggered
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Read access to the registry; stays valid after any run outcome
    pub fn registry(&self) -> MutexGuard<'_, TaskRegistry> {
        self.registry.lock()
    }

    /// Report over the registry as it stands now
    pub fn report(&self) -> Report {
        self.report.build(&self.registry.lock())
    }

    /// Run an assessment for `instruction` to completion
    pub async fn run(&self, instruction: &str) -> Result<Report, OrchestratorError> {
        self.audit.run_started(instruction);
        let started = Instant::now();

        let proposals = self
            .plan(&PlanContext::Instruction(instruction.to_string()))
            .await?;
        self.admit(proposals);

        let mut accumulated: Vec<TaskResult> = Vec::new();
        let mut round = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.abort());
            }

            let dispatch = self.registry.lock().pending_ids();
            if dispatch.is_empty() {
                info!("No pending tasks after {} round(s), assessment complete", round);
                break;
            }
            if round >= self.max_rounds {
                warn!(
                    "Reached maximum of {} rounds with {} task(s) still pending",
                    self.max_rounds,
                    dispatch.len()
                );
                break;
            }
            if let Some(budget) = self.max_runtime {
                if started.elapsed() >= budget {
                    warn!("Reached maximum runtime of {}s", budget.as_secs());
                    break;
                }
            }

            round += 1;
            info!("Round {}: dispatching {} task(s)", round, dispatch.len());

            let outcomes = self.dispatch_round(dispatch).await;

            let mut cancelled = false;
            let (mut completed, mut retrying, mut failed) = (0, 0, 0);
            for outcome in outcomes {
                match outcome {
                    TaskOutcome::Completed(result) => {
                        completed += 1;
                        accumulated.push(result);
                    }
                    TaskOutcome::Retrying => retrying += 1,
                    TaskOutcome::Failed => failed += 1,
                    TaskOutcome::Cancelled => cancelled = true,
                    TaskOutcome::Skipped => {}
                }
            }
            if cancelled || self.cancel.is_cancelled() {
                return Err(self.abort());
            }
            info!(
                "Round {} finished: {} completed, {} to retry, {} failed",
                round, completed, retrying, failed
            );

            let proposals = self
                .plan(&PlanContext::Results(accumulated.clone()))
                .await?;
            self.admit(proposals);
        }

        let report = self.report();
        self.audit.run_summary(&report.summary);
        Ok(report)
    }

    /// Ask the planner, racing the call against cancellation
    async fn plan(&self, context: &PlanContext) -> Result<Vec<Proposal>, OrchestratorError> {
        debug!("Consulting planner {}", self.planner.name());
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.abort()),
            result = self.planner.propose(context) => result.map_err(|e| {
                error!("Planner {} failed: {}", self.planner.name(), e);
                OrchestratorError::Planner(e)
            }),
        }
    }

    /// Turn in-scope proposals into pending tasks, in proposal order
    fn admit(&self, proposals: Vec<Proposal>) {
        let mut admitted = 0;
        for proposal in proposals {
            if let Err(violation) = self.scope.admit(&proposal.target) {
                self.audit.scope_violation(&violation.target);
                continue;
            }

            let mut parameters = proposal.task_parameters();
            for (key, value) in self.tools.defaults_for(&proposal.tool) {
                parameters.entry(key).or_insert(value);
            }

            let task = self
                .registry
                .lock()
                .add(proposal.description, proposal.tool, parameters);
            self.audit.task_update(task.id, task.status);
            admitted += 1;
        }
        debug!("Admitted {} task(s)", admitted);
    }

    async fn dispatch_round(&self, dispatch: Vec<TaskId>) -> Vec<TaskOutcome> {
        stream::iter(dispatch)
            .map(|id| self.run_task(id))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }

    async fn run_task(&self, id: TaskId) -> TaskOutcome {
        if self.cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }

        let (tool, parameters) = {
            let mut registry = self.registry.lock();
            let outcome = registry.mark_running(id);
            if !outcome.is_applied() {
                drop(registry);
                self.inconsistency(id, outcome);
                return TaskOutcome::Skipped;
            }
            match registry.get(id) {
                Some(task) => (task.tool.clone(), task.parameters.clone()),
                None => return TaskOutcome::Skipped,
            }
        };
        self.audit.task_update(id, TaskStatus::Running);
        self.audit.tool_start(id, &tool, &parameters);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return TaskOutcome::Cancelled,
            result = self.tools.invoke(&tool, &parameters) => result,
        };

        match result {
            Ok(output) => {
                let payload = output.to_payload();
                self.audit.tool_complete(id, &tool, &payload);

                let outcome = self.registry.lock().complete(id, payload.clone());
                if !outcome.is_applied() {
                    self.inconsistency(id, outcome);
                    return TaskOutcome::Skipped;
                }
                self.audit.task_update(id, TaskStatus::Completed);

                let findings = self
                    .registry
                    .lock()
                    .get(id)
                    .map(|task| self.report.task_findings(task))
                    .unwrap_or_default();
                for finding in &findings {
                    self.audit.vulnerability_found(finding);
                }

                TaskOutcome::Completed(TaskResult {
                    task_id: id,
                    target: parameters.get(TARGET_PARAM).cloned().unwrap_or_default(),
                    tool,
                    payload,
                })
            }
            Err(e) => {
                let cause = e.to_string();
                self.audit.tool_error(id, &tool, &cause);

                if !e.is_retryable() {
                    let outcome = self.registry.lock().fail_permanently(id, &cause);
                    if !outcome.is_applied() {
                        self.inconsistency(id, outcome);
                        return TaskOutcome::Skipped;
                    }
                    self.audit.task_update(id, TaskStatus::Failed);
                    return TaskOutcome::Failed;
                }

                let status = self.registry.lock().record_failure(id, &cause);
                match status {
                    Some(status) => {
                        self.audit.task_update(id, status);
                        if status == TaskStatus::Pending {
                            TaskOutcome::Retrying
                        } else {
                            TaskOutcome::Failed
                        }
                    }
                    None => {
                        self.audit
                            .registry_inconsistency(id, "failure recorded for a task that is not running");
                        TaskOutcome::Skipped
                    }
                }
            }
        }
    }

    fn inconsistency(&self, id: TaskId, outcome: UpdateOutcome) {
        let detail = match outcome {
            UpdateOutcome::Applied => return,
            UpdateOutcome::NotFound => "unknown task id".to_string(),
            UpdateOutcome::Rejected { from, to } => format!("transition {} -> {} refused", from, to),
        };
        self.audit.registry_inconsistency(id, &detail);
    }

    /// Fail every in-flight task after cancellation
    fn abort(&self) -> OrchestratorError {
        let aborted = self.registry.lock().abort_running(CANCELLED_CAUSE);
        for id in &aborted {
            self.audit.task_update(*id, TaskStatus::Failed);
        }
        warn!("Run cancelled, {} in-flight task(s) failed", aborted.len());
        OrchestratorError::Cancelled
    }
}
