//! Planners
//!
//! - `LlmPlanner`: asks a language model for a JSON plan
//! - `StaticPlanner`: replays a fixed plan, useful for scripted runs

use async_trait::async_trait;
use recon_core::{PlanContext, Proposal, TaskResult};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    parse_plan, LlmError, PlanParseError, PromptRegistry, SharedBackend, ANALYST_PROFILE,
    PLANNER_PROFILE,
};

/// Planner errors
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Plan rejected: {0}")]
    Parse(#[from] PlanParseError),

    #[error("Planner unavailable: {0}")]
    Unavailable(String),
}

/// Source of proposed tasks
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    /// Propose tasks for an instruction, or follow-ups for accumulated results
    async fn propose(&self, context: &PlanContext) -> Result<Vec<Proposal>, PlannerError>;
}

/// Thread-safe reference to a planner
pub type SharedPlanner = Arc<dyn Planner>;

/// Planner backed by a language model
pub struct LlmPlanner {
    backend: SharedBackend,
    prompts: PromptRegistry,
    tools: Vec<String>,
}

impl LlmPlanner {
    /// `tools` are the capability names offered to the model
    pub fn new(backend: SharedBackend, tools: Vec<String>) -> Self {
        Self {
            backend,
            prompts: PromptRegistry::load_embedded(),
            tools,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = prompts;
        self
    }

    fn system_prompt(&self, profile_id: &str) -> Result<String, PlannerError> {
        self.prompts
            .get(profile_id)
            .map(|p| p.render(&self.tools))
            .ok_or_else(|| PlannerError::Unavailable(format!("prompt profile '{}' not loaded", profile_id)))
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    fn name(&self) -> &str {
        self.backend.model_name()
    }

    async fn propose(&self, context: &PlanContext) -> Result<Vec<Proposal>, PlannerError> {
        let (system, user) = match context {
            PlanContext::Instruction(instruction) => {
                (self.system_prompt(PLANNER_PROFILE)?, format!("Instruction:\n{}", instruction))
            }
            PlanContext::Results(results) => {
                (self.system_prompt(ANALYST_PROFILE)?, render_results(results))
            }
        };

        debug!("Requesting plan from {}", self.backend.model_name());
        let response = self.backend.generate(&system, &user).await?;
        let proposals = parse_plan(&response)?;

        info!(
            "{} proposed {} task(s)",
            self.backend.model_name(),
            proposals.len()
        );
        Ok(proposals)
    }
}

/// Results as compact JSON for the analyst prompt; raw tool output is omitted
fn render_results(results: &[TaskResult]) -> String {
    let entries: Vec<Value> = results
        .iter()
        .map(|r| {
            let mut payload = r.payload.clone();
            if let Some(obj) = payload.as_object_mut() {
                obj.remove("raw_output");
            }
            serde_json::json!({
                "task_id": r.task_id.to_string(),
                "tool": r.tool,
                "target": r.target,
                "result": payload,
            })
        })
        .collect();

    format!(
        "Results so far:\n{}",
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    )
}

/// Planner that proposes a fixed task list for the instruction and nothing after
#[derive(Debug, Clone, Default)]
pub struct StaticPlanner {
    proposals: Vec<Proposal>,
}

impl StaticPlanner {
    pub fn new(proposals: Vec<Proposal>) -> Self {
        Self { proposals }
    }

    /// Build from plan text in the same JSON format the LLM planner accepts
    pub fn from_plan_text(text: &str) -> Result<Self, PlanParseError> {
        Ok(Self::new(parse_plan(text)?))
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    fn name(&self) -> &str {
        "static"
    }

    async fn propose(&self, context: &PlanContext) -> Result<Vec<Proposal>, PlannerError> {
        Ok(match context {
            PlanContext::Instruction(_) => self.proposals.clone(),
            PlanContext::Results(_) => Vec::new(),
        })
    }
}
