// External process invocation - the single collaborator actions use to
// shell out. The core blocks synchronously on the child's exit; there is
// no timeout or cancellation here, actions needing one wrap the command
// themselves.

use std::process::Command;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result, ToolCommandFailedDetails};
use crate::log_status;
use crate::utils::shell;

/// A command for the external-process collaborator.
///
/// `Line` runs through the shell (`sh -c`, `cmd /C` on Windows) and may use
/// pipes, chaining and redirects. `Args` runs the program directly with no
/// shell in between - no escaping bugs, no quoting complexity - and falls
/// back to shell execution only when a part contains shell operators.
#[derive(Debug, Clone)]
pub enum ToolCommand {
    Line(String),
    Args(Vec<String>),
}

impl ToolCommand {
    pub fn line(command: impl Into<String>) -> Self {
        ToolCommand::Line(command.into())
    }

    pub fn args<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        ToolCommand::Args(parts.into_iter().map(|s| s.into()).collect())
    }

    /// Loggable rendering of the command.
    pub fn rendered(&self) -> String {
        match self {
            ToolCommand::Line(line) => line.clone(),
            ToolCommand::Args(parts) => shell::quote_args(parts),
        }
    }
}

/// Captured result of one external command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

/// Called instead of failing when a command exits non-zero. The callback
/// observes the captured output and decides what "handled" means; the
/// invocation then returns the captured stdout as if it had succeeded.
pub type ErrorCallback = Arc<dyn Fn(&ToolOutput) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ToolOptions {
    pub log: bool,
    pub error_callback: Option<ErrorCallback>,
}

impl ToolOptions {
    pub fn logged() -> Self {
        ToolOptions {
            log: true,
            error_callback: None,
        }
    }

    pub fn with_error_callback(mut self, f: impl Fn(&ToolOutput) + Send + Sync + 'static) -> Self {
        self.error_callback = Some(Arc::new(f));
        self
    }
}

/// Run an external command, blocking until it exits, and return its stdout.
///
/// Non-zero exit raises `tool.command_failed` carrying the captured output
/// verbatim, unless an `error_callback` was supplied - then the callback
/// decides and the captured stdout is returned.
pub fn run_external(command: &ToolCommand, options: &ToolOptions) -> Result<String> {
    if options.log {
        log_status!("sh", "$ {}", command.rendered());
    }

    let output = match command {
        ToolCommand::Line(line) => run_shell(line),
        ToolCommand::Args(parts) => {
            if parts.is_empty() {
                return Err(Error::params_invalid(
                    "command",
                    None,
                    "Command cannot be empty",
                ));
            }
            if parts.iter().any(|p| shell::requires_shell(p)) {
                // Parts carry shell operators; the caller wants shell
                // semantics. Operator parts pass through verbatim, plain
                // parts are quoted so their word boundaries survive.
                let line = parts
                    .iter()
                    .map(|p| {
                        if shell::requires_shell(p) {
                            p.clone()
                        } else {
                            shell::quote_arg(p)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                run_shell(&line)
            } else {
                run_direct(parts)
            }
        }
    };

    if options.log && !output.success {
        log_status!("sh", "Exit status: {}", output.exit_code);
    }

    if output.success {
        return Ok(output.stdout);
    }

    if let Some(callback) = &options.error_callback {
        callback(&output);
        return Ok(output.stdout);
    }

    Err(Error::tool_command_failed(ToolCommandFailedDetails {
        command: command.rendered(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    }))
}

fn run_shell(command: &str) -> ToolOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    capture(&mut cmd)
}

fn run_direct(parts: &[String]) -> ToolOutput {
    let mut cmd = Command::new(&parts[0]);
    if parts.len() > 1 {
        cmd.args(&parts[1..]);
    }
    capture(&mut cmd)
}

fn capture(cmd: &mut Command) -> ToolOutput {
    match cmd.output() {
        Ok(out) => ToolOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => ToolOutput {
            stdout: String::new(),
            stderr: format!("Command error: {}", e),
            success: false,
            exit_code: -1,
        },
    }
}
