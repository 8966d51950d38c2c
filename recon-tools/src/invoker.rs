//! Tool registry and invocation
//!
//! Maps tool names to capabilities. Parameters are validated before anything
//! runs, and every invocation is bounded by a timeout.

use async_trait::async_trait;
use recon_core::{Parameters, TARGET_PARAM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{binary_available, FfufTool, GobusterTool, NmapTool, ToolOutput};

/// Tool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
    /// Wordlist used by discovery tools when the planner names none
    pub default_wordlist: Option<PathBuf>,
    pub nmap_path: String,
    pub gobuster_path: String,
    pub ffuf_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            default_wordlist: Some(PathBuf::from("/usr/share/wordlists/dirb/common.txt")),
            nmap_path: "nmap".to_string(),
            gobuster_path: "gobuster".to_string(),
            ffuf_path: "ffuf".to_string(),
        }
    }
}

/// Errors from tool invocation
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing parameter '{param}' for {tool}")]
    MissingParameter { tool: String, param: String },

    #[error("Invalid parameter '{param}' for {tool}: {reason}")]
    InvalidParameter {
        tool: String,
        param: String,
        reason: String,
    },

    #[error("{tool} execution failed: {cause}")]
    Execution { tool: String, cause: String },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    pub fn execution(tool: &str, cause: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.to_string(),
            cause: cause.into(),
        }
    }

    pub fn invalid(tool: &str, param: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidParameter {
            tool: tool.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Unknown tools and bad parameters are structural; retrying cannot fix them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Execution { .. } | ToolError::Timeout { .. })
    }
}

/// A named external capability
#[async_trait]
pub trait ToolCapability: Send + Sync {
    /// Registry name (e.g. "nmap")
    fn name(&self) -> &str;

    /// Parameters that must be present besides `target`
    fn required_parameters(&self) -> &[&'static str] {
        &[]
    }

    /// Defaults merged into a task's parameters when absent
    fn default_parameters(&self) -> Parameters {
        Parameters::new()
    }

    /// Executable backing this capability, if any
    fn binary(&self) -> Option<&str> {
        None
    }

    /// Run the tool. Any transient artifact must be cleaned up on every path.
    async fn invoke(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError>;
}

/// Thread-safe reference to a tool capability
pub type SharedTool = Arc<dyn ToolCapability>;

/// Registry of capabilities keyed by name
#[derive(Clone)]
pub struct ToolInvoker {
    tools: HashMap<String, SharedTool>,
    timeout: Duration,
}

impl ToolInvoker {
    /// Empty registry with the given per-invocation timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    /// Registry holding the built-in nmap, gobuster and ffuf capabilities
    pub fn with_defaults(config: &ToolsConfig) -> Self {
        let mut invoker = Self::new(Duration::from_secs(config.timeout_secs));
        invoker.register(Arc::new(NmapTool::new(&config.nmap_path)));
        invoker.register(Arc::new(GobusterTool::new(
            &config.gobuster_path,
            config.default_wordlist.clone(),
        )));
        invoker.register(Arc::new(FfufTool::new(
            &config.ffuf_path,
            config.default_wordlist.clone(),
        )));
        invoker
    }

    /// Add (or replace) a capability under its own name
    pub fn register(&mut self, tool: SharedTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Defaults for `tool`; empty for unknown tools
    pub fn defaults_for(&self, tool: &str) -> Parameters {
        self.tools
            .get(tool)
            .map(|t| t.default_parameters())
            .unwrap_or_default()
    }

    /// Resolve the tool and check required parameters without running anything
    pub fn validate(&self, tool: &str, parameters: &Parameters) -> Result<SharedTool, ToolError> {
        let capability = self
            .tools
            .get(tool)
            .ok_or_else(|| ToolError::UnknownTool(tool.to_string()))?;

        let required = std::iter::once(TARGET_PARAM).chain(capability.required_parameters().iter().copied());
        for param in required {
            let present = parameters
                .get(param)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                return Err(ToolError::MissingParameter {
                    tool: tool.to_string(),
                    param: param.to_string(),
                });
            }
        }

        Ok(capability.clone())
    }

    /// Validate, then run the tool under the configured timeout.
    ///
    /// On timeout the invocation future is dropped, which kills the child
    /// process and removes its temporary files.
    pub async fn invoke(&self, tool: &str, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        let capability = self.validate(tool, parameters)?;

        debug!("Invoking {} with {:?}", tool, parameters);

        match tokio::time::timeout(self.timeout, capability.invoke(parameters)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} exceeded {}s timeout", tool, self.timeout.as_secs());
                Err(ToolError::Timeout {
                    tool: tool.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Report which registered tools have their executable on this system
    pub fn check_available(&self) -> Vec<(String, bool)> {
        self.names()
            .into_iter()
            .map(|name| {
                let available = self
                    .tools
                    .get(name)
                    .and_then(|t| t.binary())
                    .map(binary_available)
                    .unwrap_or(true);
                (name.to_string(), available)
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("tools", &self.names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Read a parameter, treating blank values as absent
pub fn param<'a>(parameters: &'a Parameters, key: &str) -> Option<&'a str> {
    parameters
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Read a positive integer parameter, falling back to `default`
pub fn numeric_param(
    tool: &str,
    parameters: &Parameters,
    key: &str,
    default: u32,
) -> Result<u32, ToolError> {
    match param(parameters, key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ToolError::invalid(tool, key, format!("expected a positive integer, got '{}'", raw))),
        },
    }
}

/// The scope-checked target; refuses values that would parse as a flag
pub fn target_param<'a>(tool: &str, parameters: &'a Parameters) -> Result<&'a str, ToolError> {
    let target = param(parameters, TARGET_PARAM).ok_or_else(|| ToolError::MissingParameter {
        tool: tool.to_string(),
        param: TARGET_PARAM.to_string(),
    })?;

    if target.starts_with('-') || target.chars().any(char::is_whitespace) {
        return Err(ToolError::invalid(tool, TARGET_PARAM, "not a host, address or URL"));
    }
    Ok(target)
}

/// Prefix `http://` when the target carries no scheme
pub fn as_url(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    }
}
