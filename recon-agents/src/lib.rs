//! Recon Agents
//!
//! Planner adapters that turn an instruction, or the results gathered so far,
//! into proposed tasks:
//! - **Backends**: OpenAI-compatible (OpenAI, OpenRouter, Ollama) and Anthropic
//! - **Prompts**: planner/analyst profiles embedded as TOML in `prompts/`
//! - **Plan parser**: strict JSON plan format with typed rejections
//! - **Planners**: LLM-backed planner and a static plan-file planner

pub mod backend;
pub mod prompts;
pub mod plan_parser;
pub mod planner;

pub use backend::*;
pub use prompts::*;
pub use plan_parser::*;
pub use planner::*;
