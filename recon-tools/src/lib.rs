//! Recon Tools
//!
//! Uniform invocation of external scan tools:
//! - Tool registry with parameter validation and bounded execution
//! - Process runner (child killed when the invocation is dropped)
//! - Built-in capabilities: nmap, gobuster, ffuf

pub mod invoker;
pub mod output;
pub mod process;
pub mod nmap;
pub mod gobuster;
pub mod ffuf;

pub use invoker::*;
pub use output::*;
pub use process::*;
pub use nmap::*;
pub use gobuster::*;
pub use ffuf::*;
