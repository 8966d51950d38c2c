//! External process execution
//!
//! Children are spawned with `kill_on_drop`, so dropping an invocation
//! (timeout, cancellation) also terminates the scanner.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::ToolError;

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// Render a command line for logs and result payloads
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|a| {
            if a.is_empty() || a.contains(' ') {
                format!("'{}'", a)
            } else {
                a.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program` to completion; a non-zero exit is an execution failure
pub async fn run_command(tool: &str, program: &str, args: &[String]) -> Result<CommandOutput, ToolError> {
    let command = display_command(program, args);
    debug!("Running {} command: {}", tool, command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ToolError::execution(tool, format!("failed to start {}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_status = output.status.code().unwrap_or(-1);

    if !output.status.success() {
        let detail = stderr.trim();
        return Err(ToolError::execution(
            tool,
            if detail.is_empty() {
                format!("exit status {}", exit_status)
            } else {
                format!("exit status {}: {}", exit_status, detail)
            },
        ));
    }

    Ok(CommandOutput {
        command,
        stdout,
        stderr,
        exit_status,
    })
}

/// Whether `program` resolves to an executable, either directly or via `PATH`
pub fn binary_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Fail with a missing-resource error unless `path` is a readable file
pub async fn require_file(tool: &str, what: &str, path: &str) -> Result<(), ToolError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ToolError::execution(tool, format!("{} not found: {}", what, path))),
    }
}
