//! ffuf web fuzzer
//!
//! Results are written as JSON to a temporary file and parsed from there.

use async_trait::async_trait;
use recon_core::Parameters;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

use crate::{
    as_url, numeric_param, param, require_file, run_command, target_param, Discoveries,
    ToolCapability, ToolError, ToolOutput,
};

const DEFAULT_EXTENSIONS: &str = "php,html,txt";
const DEFAULT_THREADS: u32 = 40;

static EXTENSIONS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.?[A-Za-z0-9]+(?:,\.?[A-Za-z0-9]+)*$").unwrap());

/// ffuf JSON report (only the fields we read)
#[derive(Debug, Deserialize)]
struct FfufReport {
    #[serde(default)]
    results: Vec<FfufHit>,
}

/// A single ffuf match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FfufHit {
    pub url: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub length: u64,
    #[serde(rename = "content-type", default)]
    pub content_type: String,
}

impl FfufHit {
    /// Path component of the matched URL
    pub fn path(&self) -> &str {
        let after_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(self.url.as_str());
        after_scheme
            .find('/')
            .map(|i| &after_scheme[i..])
            .unwrap_or("/")
    }
}

/// ffuf capability
#[derive(Debug, Clone)]
pub struct FfufTool {
    binary: String,
    default_wordlist: Option<PathBuf>,
}

impl FfufTool {
    pub fn new(binary: &str, default_wordlist: Option<PathBuf>) -> Self {
        Self {
            binary: binary.to_string(),
            default_wordlist,
        }
    }

    fn build_args(&self, parameters: &Parameters, output_path: &str) -> Result<Vec<String>, ToolError> {
        let target = target_param("ffuf", parameters)?;
        let wordlist = param(parameters, "wordlist").ok_or_else(|| ToolError::MissingParameter {
            tool: "ffuf".to_string(),
            param: "wordlist".to_string(),
        })?;

        let extensions = param(parameters, "extensions").unwrap_or(DEFAULT_EXTENSIONS);
        if !EXTENSIONS_REGEX.is_match(extensions) {
            return Err(ToolError::invalid(
                "ffuf",
                "extensions",
                format!("bad extension list '{}'", extensions),
            ));
        }
        let threads = numeric_param("ffuf", parameters, "threads", DEFAULT_THREADS)?;

        Ok(vec![
            "-u".to_string(),
            fuzz_url(target),
            "-w".to_string(),
            wordlist.to_string(),
            "-e".to_string(),
            dotted_extensions(extensions),
            "-t".to_string(),
            threads.to_string(),
            "-s".to_string(),
            "-o".to_string(),
            output_path.to_string(),
            "-of".to_string(),
            "json".to_string(),
        ])
    }
}

#[async_trait]
impl ToolCapability for FfufTool {
    fn name(&self) -> &str {
        "ffuf"
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
            require_file("ffuf", "Wordlist", wordlist).await?;
        }

        let output_file = tempfile::Builder::new()
            .prefix("ffuf-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| ToolError::execution("ffuf", format!("cannot create output file: {}", e)))?;
        let output_path = output_file.path().to_string_lossy().into_owned();

        let args = self.build_args(parameters, &output_path)?;
        let run = run_command("ffuf", &self.binary, &args).await?;

        let raw = tokio::fs::read_to_string(output_file.path())
            .await
            .map_err(|e| ToolError::execution("ffuf", format!("cannot read output file: {}", e)))?;

        let hits = parse_ffuf_output(&raw)?;
        debug!("ffuf discovered {} entries", hits.len());

        Ok(ToolOutput {
            tool: "ffuf".to_string(),
            command: run.command,
            discoveries: Discoveries::DiscoveredPaths(
                hits.iter().map(|h| h.path().to_string()).collect(),
            ),
            raw_output: raw,
            exit_status: run.exit_status,
        })
    }
}

/// Parse ffuf's JSON report
pub fn parse_ffuf_output(raw: &str) -> Result<Vec<FfufHit>, ToolError> {
    // ffuf leaves the file empty when it matched nothing
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<FfufReport>(raw)
        .map(|report| report.results)
        .map_err(|e| ToolError::execution("ffuf", format!("malformed output: {}", e)))
}

/// Ensure the URL carries a scheme and the FUZZ keyword
fn fuzz_url(target: &str) -> String {
    let url = as_url(target);
    if url.contains("FUZZ") {
        url
    } else {
        format!("{}/FUZZ", url.trim_end_matches('/'))
    }
}

/// `php,html` -> `.php,.html`
fn dotted_extensions(extensions: &str) -> String {
    extensions
        .split(',')
        .map(|e| {
            if e.starts_with('.') {
                e.to_string()
            } else {
                format!(".{}", e)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_output() {
        let raw = r#"{
            "commandline": "ffuf -u http://example.com/FUZZ",
            "results": [
                {"input": {"FUZZ": "admin"}, "url": "http://example.com/admin", "status": 301, "length": 169, "content-type": "text/html"},
                {"input": {"FUZZ": "robots.txt"}, "url": "https://example.com/robots.txt", "status": 200, "length": 42}
            ]
        }"#;
        let hits = parse_ffuf_output(raw).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].status, 301);
        assert_eq!(hits[0].content_type, "text/html");
        assert_eq!(hits[0].path(), "/admin");
        assert_eq!(hits[1].path(), "/robots.txt");
    }

    #[test]
    fn test_path_of_bare_host_is_root() {
        let hit = FfufHit {
            url: "http://example.com".to_string(),
            status: 200,
            length: 0,
            content_type: String::new(),
        };
        assert_eq!(hit.path(), "/");
    }

    #[test]
    fn test_parse_empty_and_malformed() {
        assert!(parse_ffuf_output(r#"{"results": []}"#).unwrap().is_empty());
        assert!(parse_ffuf_output("{}").unwrap().is_empty());
        assert!(parse_ffuf_output("").unwrap().is_empty());

        let err = parse_ffuf_output("not json").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("malformed output"));
    }

    #[test]
    fn test_fuzz_url() {
        assert_eq!(fuzz_url("example.com"), "http://example.com/FUZZ");
        assert_eq!(fuzz_url("https://example.com/"), "https://example.com/FUZZ");
        assert_eq!(fuzz_url("http://example.com/api/FUZZ.json"), "http://example.com/api/FUZZ.json");
    }

    #[test]
    fn test_build_args() {
        let tool = FfufTool::new("ffuf", None);
        let args = tool
            .build_args(
                &params(&[("target", "example.com"), ("wordlist", "/w.txt"), ("extensions", "php,.bak")]),
                "/tmp/out.json",
            )
            .unwrap();
        assert_eq!(
            args,
            vec![
                "-u", "http://example.com/FUZZ", "-w", "/w.txt", "-e", ".php,.bak", "-t", "40",
                "-s", "-o", "/tmp/out.json", "-of", "json",
            ]
        );

        let bad = params(&[("target", "example.com"), ("wordlist", "/w.txt"), ("extensions", "php -x")]);
        assert!(matches!(
            tool.build_args(&bad, "/o"),
            Err(ToolError::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_wordlist_fails_before_running() {
        let tool = FfufTool::new("definitely-not-ffuf", None);
        let err = tool
            .invoke(&params(&[("target", "example.com"), ("wordlist", "/nonexistent/list.txt")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Wordlist not found"));
    }
}
