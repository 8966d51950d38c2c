//! Configuration file
//!
//! ```toml
//! [scope]
//! domains = ["example.com"]
//! ip_ranges = ["192.168.1.0/24"]
//! wildcards = ["*.example.com"]
//!
//! [tools]
//! timeout_secs = 300
//! default_wordlist = "/usr/share/wordlists/dirb/common.txt"
//!
//! [orchestrator]
//! max_rounds = 10
//! max_runtime_secs = 0
//! max_concurrent = 1
//! retry_limit = 3
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use recon_core::{ScopeConfig, DEFAULT_RETRY_LIMIT};
use recon_tools::ToolsConfig;

/// Top-level configuration; every table is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub scope: ScopeConfig,
    pub tools: ToolsConfig,
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub max_rounds: usize,
    /// Wall-clock budget in seconds (0 = unlimited)
    pub max_runtime_secs: u64,
    pub max_concurrent: usize,
    pub retry_limit: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            max_runtime_secs: 0,
            max_concurrent: 1,
            retry_limit: DEFAULT_RETRY_LIMIT,
        }
    }
}

impl OrchestratorSettings {
    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_secs > 0).then(|| Duration::from_secs(self.max_runtime_secs))
    }
}

impl ReconConfig {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
