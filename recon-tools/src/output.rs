//! Structured tool results

use serde_json::{json, Map, Value};

/// Upper bound on raw output kept in a result payload
const MAX_RAW_OUTPUT: usize = 16 * 1024;

/// Tool-specific discovery list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discoveries {
    /// Ports reported open by a port scan
    OpenPorts(Vec<u16>),
    /// Paths (or hostnames) found by content discovery
    DiscoveredPaths(Vec<String>),
}

impl Discoveries {
    pub fn len(&self) -> usize {
        match self {
            Discoveries::OpenPorts(ports) => ports.len(),
            Discoveries::DiscoveredPaths(paths) => paths.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one successful tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool: String,
    /// Command line that was executed
    pub command: String,
    pub discoveries: Discoveries,
    pub raw_output: String,
    pub exit_status: i32,
}

impl ToolOutput {
    /// Result payload stored on the task.
    ///
    /// Discoveries appear under `open_ports` or `discovered_paths`, which is
    /// what the report's finding rules read.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("tool".into(), json!(self.tool));
        payload.insert("command".into(), json!(self.command));
        payload.insert("exit_status".into(), json!(self.exit_status));
        payload.insert("raw_output".into(), json!(truncate(&self.raw_output, MAX_RAW_OUTPUT)));

        match &self.discoveries {
            Discoveries::OpenPorts(ports) => {
                payload.insert("open_ports".into(), json!(ports));
            }
            Discoveries::DiscoveredPaths(paths) => {
                payload.insert("discovered_paths".into(), json!(paths));
            }
        }

        Value::Object(payload)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    format!("{}...(truncated)", &text[..cut])
}
