//! Recon Core - Task model, scope filter and reporting for recon orchestration
//!
//! This crate provides the foundational primitives:
//! - Tasks and the in-memory task registry (lifecycle state machine)
//! - Scope definitions that gate which targets may be touched
//! - Planner proposals and the context handed back to the planner
//! - Finding extraction and the final run report
//! - The audit sink interface for fire-and-forget event logging

pub mod audit;
pub mod proposal;
pub mod report;
pub mod scope;
pub mod task;

pub use audit::*;
pub use proposal::*;
pub use report::*;
pub use scope::*;
pub use task::*;

/// Default number of failed attempts a task may accumulate
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Parameter key every task must carry
pub const TARGET_PARAM: &str = "target";
