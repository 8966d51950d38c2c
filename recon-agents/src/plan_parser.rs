//! Strict plan parser
//!
//! Planner output must carry a JSON document of the form
//! `{"tasks": [{"tool", "target", "description", "parameters"}]}`, either bare
//! or inside a fenced code block. Everything else is rejected; nothing in the
//! text is ever evaluated.

use recon_core::{Parameters, Proposal, TARGET_PARAM};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Reasons a plan is rejected
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("no JSON plan found in planner output")]
    NoPlan,

    #[error("malformed plan: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("task {index}: field '{field}' is empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("task {index}: parameter '{key}' must be a string, number or boolean")]
    NonScalarParameter { index: usize, key: String },

    #[error("task {index}: parameters.target '{parameter}' disagrees with target '{target}'")]
    ConflictingTarget {
        index: usize,
        target: String,
        parameter: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlan {
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    tool: String,
    target: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
}

/// Parse planner text into proposals
///
/// An empty task list is a valid plan and means "nothing more to do".
pub fn parse_plan(text: &str) -> Result<Vec<Proposal>, PlanParseError> {
    let document = extract_document(text).ok_or(PlanParseError::NoPlan)?;
    let plan: RawPlan = serde_json::from_str(document)?;

    plan.tasks
        .into_iter()
        .enumerate()
        .map(|(index, raw)| into_proposal(index, raw))
        .collect()
}

fn into_proposal(index: usize, raw: RawTask) -> Result<Proposal, PlanParseError> {
    let tool = raw.tool.trim().to_string();
    if tool.is_empty() {
        return Err(PlanParseError::EmptyField { index, field: "tool" });
    }
    let target = raw.target.trim().to_string();
    if target.is_empty() {
        return Err(PlanParseError::EmptyField { index, field: "target" });
    }

    let mut parameters = Parameters::new();
    for (key, value) in raw.parameters {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(PlanParseError::NonScalarParameter { index, key }),
        };

        if key == TARGET_PARAM {
            if value.trim() != target {
                return Err(PlanParseError::ConflictingTarget {
                    index,
                    target,
                    parameter: value,
                });
            }
            continue;
        }
        parameters.insert(key, value);
    }

    let description = raw
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("{} against {}", tool, target));

    Ok(Proposal {
        tool,
        target,
        description,
        parameters,
    })
}

/// Locate the JSON document: a fenced block wins, otherwise the outermost braces
fn extract_document(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip the info string (`json`) up to the end of the fence line
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}
