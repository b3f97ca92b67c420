//! Renewal executor abstraction
//!
//! The coordinator only sees [`RenewalOutcome`]s, so tests can swap the real
//! subprocess for a scripted fake.

use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

/// Result of a single executor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    Success,
    /// Non-zero exit; `None` when the process was killed by a signal
    ProcessFailure(Option<i32>),
    Timeout,
    /// The executable could not be found
    ToolMissing(String),
    Error(String),
}

impl RenewalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for RenewalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::ProcessFailure(Some(code)) => write!(f, "exit code {}", code),
            Self::ProcessFailure(None) => write!(f, "terminated by signal"),
            Self::Timeout => write!(f, "timed out"),
            Self::ToolMissing(program) => write!(f, "{} not found", program),
            Self::Error(message) => write!(f, "{}", message),
        }
    }
}

/// Something that can run the renewal tool
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the tool with `args`, giving up after `timeout`
    async fn run(&self, args: &[String], timeout: Duration) -> RenewalOutcome;
}

/// Runs the renewal tool as a child process
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn run(&self, args: &[String], timeout: Duration) -> RenewalOutcome {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(program = %self.program, args = ?args, "Spawning renewal command");

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => return RenewalOutcome::Timeout,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return RenewalOutcome::ToolMissing(self.program.clone());
            }
            Ok(Err(e)) => return RenewalOutcome::Error(e.to_string()),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            debug!(
                stdout = %String::from_utf8_lossy(&output.stdout),
                "Renewal command output"
            );
            RenewalOutcome::Success
        } else {
            error!(
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Renewal command failed"
            );
            RenewalOutcome::ProcessFailure(output.status.code())
        }
    }
}
