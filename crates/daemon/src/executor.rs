//! Process execution for registered commands.
//!
//! The [`CommandExecutor`] trait is the seam between the registry and the
//! host. [`SystemExecutor`] spawns real processes; tests substitute a
//! recording implementation.

use std::future::Future;
use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from running a command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("`{command}` exited with {}", describe_code(.code))]
    Failed {
        /// Full command line.
        command: String,
        /// Exit code, or `None` if terminated by a signal.
        code: Option<i32>,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ExecError {
    /// Exit code of a failed run.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExecError::Failed { code, .. } => *code,
            ExecError::Spawn { .. } => None,
        }
    }

    /// Whether the failure looks like missing privileges.
    ///
    /// `systemctl` exits with 1 when polkit denies the action.
    pub fn needs_privilege_hint(&self) -> bool {
        match self {
            ExecError::Failed { code, .. } => *code == Some(1),
            ExecError::Spawn { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
        }
    }
}

/// Runs a program with arguments and reports success or failure.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Run `program` with `args` to completion.
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<(), ExecError>> + Send;
}

/// Spawns host processes with inherited stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    /// Create a new system executor.
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), ExecError> {
        let command_line = command_line(program, args);
        debug!("exec: {}", command_line);

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(ExecError::Failed {
                command: command_line,
                code: status.code(),
            });
        }

        info!("exec ok: {}", command_line);
        Ok(())
    }
}

/// Render a program and its arguments as one line for logs.
pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
