//! Recon Runtime
//!
//! Drives the plan → admit → dispatch → analyze loop:
//! - Proposals are admitted only when their target is in scope
//! - Each round dispatches every pending task, retries included
//! - The loop ends when a round has nothing to dispatch, or a bound is hit
//! - Cancellation aborts in-flight tools and fails their tasks

pub mod orchestrator;

pub use orchestrator::*;
