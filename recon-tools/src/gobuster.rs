//! gobuster content/DNS discovery
//!
//! Output goes to a temporary file that is removed when the invocation ends,
//! whether it succeeds, fails or is dropped.

use async_trait::async_trait;
use recon_core::Parameters;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

use crate::{
    as_url, numeric_param, param, require_file, run_command, target_param, Discoveries,
    ToolCapability, ToolError, ToolOutput,
};

const DEFAULT_STATUS_CODES: &str = "200,204,301,302,307,401,403";
const DEFAULT_THREADS: u32 = 10;

static STATUS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Status:\s*(\d{3})").unwrap());

static SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Size:\s*(\d+)").unwrap());

static STATUS_LIST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}(?:,\d{3})*$").unwrap());

/// gobuster scan modes this capability drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GobusterMode {
    Dir,
    Dns,
    Vhost,
}

impl GobusterMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "dir" => Some(GobusterMode::Dir),
            "dns" => Some(GobusterMode::Dns),
            "vhost" => Some(GobusterMode::Vhost),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            GobusterMode::Dir => "dir",
            GobusterMode::Dns => "dns",
            GobusterMode::Vhost => "vhost",
        }
    }
}

/// A line of gobuster output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GobusterHit {
    pub path: String,
    pub status: Option<u16>,
    pub size: Option<u64>,
}

/// gobuster capability
#[derive(Debug, Clone)]
pub struct GobusterTool {
    binary: String,
    default_wordlist: Option<PathBuf>,
}

impl GobusterTool {
    pub fn new(binary: &str, default_wordlist: Option<PathBuf>) -> Self {
        Self {
            binary: binary.to_string(),
            default_wordlist,
        }
    }

    fn build_args(&self, parameters: &Parameters, output_path: &str) -> Result<Vec<String>, ToolError> {
        let target = target_param("gobuster", parameters)?;
        let wordlist = param(parameters, "wordlist").ok_or_else(|| ToolError::MissingParameter {
            tool: "gobuster".to_string(),
            param: "wordlist".to_string(),
        })?;

        let mode_raw = param(parameters, "mode").unwrap_or("dir");
        let mode = GobusterMode::parse(mode_raw)
            .ok_or_else(|| ToolError::invalid("gobuster", "mode", format!("unsupported mode '{}'", mode_raw)))?;
        let threads = numeric_param("gobuster", parameters, "threads", DEFAULT_THREADS)?;

        let mut args = vec![mode.as_str().to_string()];
        match mode {
            GobusterMode::Dns => {
                args.extend(["-d".to_string(), target.to_string()]);
            }
            GobusterMode::Dir | GobusterMode::Vhost => {
                args.extend(["-u".to_string(), as_url(target)]);
            }
        }
        args.extend([
            "-w".to_string(),
            wordlist.to_string(),
            "-t".to_string(),
            threads.to_string(),
        ]);

        if mode == GobusterMode::Dir {
            let codes = param(parameters, "status_codes").unwrap_or(DEFAULT_STATUS_CODES);
            if !STATUS_LIST_REGEX.is_match(codes) {
                return Err(ToolError::invalid(
                    "gobuster",
                    "status_codes",
                    format!("bad status code list '{}'", codes),
                ));
            }
            // An explicit allow-list conflicts with gobuster's default 404 blacklist
            args.extend([
                "-s".to_string(),
                codes.to_string(),
                "-b".to_string(),
                String::new(),
            ]);
        }

        args.extend(["-q".to_string(), "-o".to_string(), output_path.to_string()]);
        Ok(args)
    }
}

#[async_trait]
impl ToolCapability for GobusterTool {
    fn name(&self) -> &str {
        "gobuster"
    }

    fn required_parameters(&self) -> &[&'static str] {
        &["wordlist"]
    }

    fn default_parameters(&self) -> Parameters {
        self.default_wordlist
            .iter()
            .map(|w| ("wordlist".to_string(), w.to_string_lossy().into_owned()))
            .collect()
    }

    fn binary(&self) -> Option<&str> {
        Some(&self.binary)
    }

    async fn invoke(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        if let Some(wordlist) = param(parameters, "wordlist") {
            require_file("gobuster", "Wordlist", wordlist).await?;
        }

        // Removed on drop, including when the invocation times out
        let output_file = tempfile::Builder::new()
            .prefix("gobuster-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| ToolError::execution("gobuster", format!("cannot create output file: {}", e)))?;
        let output_path = output_file.path().to_string_lossy().into_owned();

        let args = self.build_args(parameters, &output_path)?;
        let run = run_command("gobuster", &self.binary, &args).await?;

        let raw = tokio::fs::read_to_string(output_file.path())
            .await
            .map_err(|e| ToolError::execution("gobuster", format!("cannot read output file: {}", e)))?;

        let hits = parse_gobuster_output(&raw);
        debug!("gobuster discovered {} entries", hits.len());

        Ok(ToolOutput {
            tool: "gobuster".to_string(),
            command: run.command,
            discoveries: Discoveries::DiscoveredPaths(hits.into_iter().map(|h| h.path).collect()),
            raw_output: raw,
            exit_status: run.exit_status,
        })
    }
}

/// Parse `Found: <host>` (dns/vhost) and `/<path> (Status: ...)` (dir) lines
pub fn parse_gobuster_output(output: &str) -> Vec<GobusterHit> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let entry = if let Some(rest) = line.strip_prefix("Found: ") {
                rest.trim()
            } else if line.starts_with('/') {
                line
            } else {
                return None;
            };

            let path = entry.split_whitespace().next()?.to_string();
            let status = STATUS_REGEX
                .captures(entry)
                .and_then(|c| c[1].parse::<u16>().ok());
            let size = SIZE_REGEX.captures(entry).and_then(|c| c[1].parse::<u64>().ok());

            Some(GobusterHit { path, status, size })
        })
        .collect()
}
