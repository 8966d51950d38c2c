//! nmap port scanner
//!
//! Runs a service/version scan and reads open ports from the normal output.

use async_trait::async_trait;
use recon_core::Parameters;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::{param, run_command, target_param, Discoveries, ToolCapability, ToolError, ToolOutput};

static OPEN_PORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d{1,5})/(tcp|udp|sctp)\s+open(?:\s|$)").unwrap()
});

static PORT_SPEC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[TUS]:)?\d{1,5}(?:-\d{1,5})?(?:,(?:[TUS]:)?\d{1,5}(?:-\d{1,5})?)*$").unwrap()
});

/// nmap capability
#[derive(Debug, Clone)]
pub struct NmapTool {
    binary: String,
}

impl NmapTool {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    fn build_args(&self, parameters: &Parameters) -> Result<Vec<String>, ToolError> {
        let target = target_param("nmap", parameters)?;
        let mut args = vec!["-sV".to_string()];

        if let Some(ports) = param(parameters, "ports") {
            if !PORT_SPEC_REGEX.is_match(ports) {
                return Err(ToolError::invalid("nmap", "ports", format!("bad port list '{}'", ports)));
            }
            args.push("-p".to_string());
            args.push(ports.to_string());
        }

        args.push(target.to_string());
        Ok(args)
    }
}

#[async_trait]
impl ToolCapability for NmapTool {
    fn name(&self) -> &str {
        "nmap"
    }

    fn binary(&self) -> Option<&str> {
        Some(&self.binary)
    }

    async fn invoke(&self, parameters: &Parameters) -> Result<ToolOutput, ToolError> {
        let args = self.build_args(parameters)?;
        let output = run_command("nmap", &self.binary, &args).await?;

        let ports = parse_open_ports(&output.stdout);
        debug!("nmap found {} open ports", ports.len());

        Ok(ToolOutput {
            tool: "nmap".to_string(),
            command: output.command,
            discoveries: Discoveries::OpenPorts(ports),
            raw_output: output.stdout,
            exit_status: output.exit_status,
        })
    }
}

/// Extract open port numbers (deduplicated, in output order)
pub fn parse_open_ports(output: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = Vec::new();
    for cap in OPEN_PORT_REGEX.captures_iter(output) {
        if let Ok(port) = cap[1].parse::<u16>() {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
    }
    ports
}
