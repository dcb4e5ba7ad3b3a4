//! Interactive line-oriented shell.
//!
//! Reads commands from stdin, handles a few built-ins (`help`, `clear`,
//! `logs`, `logmode`, `exit`) and dispatches everything else through the
//! command registry.

use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::executor::CommandExecutor;
use crate::logging::LogBuffer;
use crate::registry::{CommandRegistry, DispatchOutcome};

/// Prompt printed before each line.
pub const PROMPT: &str = "[rpcs-daemon] > ";

/// Lines shown by `logs` without an argument.
pub const DEFAULT_LOG_LINES: usize = 50;

/// Lines shown after each command when `logmode` is on.
pub const LOGMODE_LINES: usize = 20;

/// What the shell loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellAction {
    /// Read the next line.
    Continue,
    /// Leave the shell.
    Exit,
}

/// Interactive command shell.
pub struct Shell<E: CommandExecutor> {
    registry: Arc<CommandRegistry<E>>,
    logs: LogBuffer,
    server_status: String,
    show_logs_after_command: bool,
}

impl<E: CommandExecutor> Shell<E> {
    /// Create a shell. `server_status` is shown in the banner.
    pub fn new(
        registry: Arc<CommandRegistry<E>>,
        logs: LogBuffer,
        server_status: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            logs,
            server_status: server_status.into(),
            show_logs_after_command: false,
        }
    }

    /// Whether the log tail is printed after each command.
    pub fn logmode(&self) -> bool {
        self.show_logs_after_command
    }

    /// Banner with the command list and shell built-ins.
    pub fn banner(&self) -> String {
        format!(
            "RPCS Daemon (stdin mode)\n  {}\n\nCommands:\n{}\n\nOther:\n\
             \x20 help            - show this help\n\
             \x20 clear           - clear screen\n\
             \x20 logs [N]        - show last N log lines (default {})\n\
             \x20 logmode on|off  - auto-show last {} lines after each command\n\
             \x20 exit            - stop daemon\n\n\
             One-shot usage:\n\
             \x20 rpcs run <command> [args...]\n",
            self.server_status,
            self.registry.help_text(),
            DEFAULT_LOG_LINES,
            LOGMODE_LINES,
        )
    }

    /// Read lines from stdin until `exit`, end of input or cancellation.
    pub async fn run_stdin(&mut self, shutdown: CancellationToken) -> io::Result<()> {
        let mut out = io::stdout();
        write!(out, "{}", self.banner())?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                // End of input
                writeln!(out)?;
                break;
            };

            if self.handle_line(&line, &mut out).await? == ShellAction::Exit {
                break;
            }
        }

        Ok(())
    }

    /// Handle one input line, writing any user-facing output to `out`.
    pub async fn handle_line<W: Write>(
        &mut self,
        line: &str,
        out: &mut W,
    ) -> io::Result<ShellAction> {
        let mut parts = line.split_whitespace();
        let Some(first) = parts.next() else {
            return Ok(ShellAction::Continue);
        };
        let command = first.to_lowercase();
        let rest: Vec<String> = parts.map(str::to_string).collect();

        match command.as_str() {
            "help" => write!(out, "{}", self.banner())?,
            "clear" => {
                write!(out, "\x1B[2J\x1B[H")?;
                out.flush()?;
            }
            "logs" => {
                let n = match rest.as_slice() {
                    [n] => n.parse().unwrap_or(DEFAULT_LOG_LINES),
                    _ => DEFAULT_LOG_LINES,
                };
                print_tail(&self.logs, n, out)?;
            }
            "logmode" => match rest.as_slice() {
                [mode] if mode.eq_ignore_ascii_case("on") || mode.eq_ignore_ascii_case("off") => {
                    self.show_logs_after_command = mode.eq_ignore_ascii_case("on");
                    let state = if self.show_logs_after_command { "on" } else { "off" };
                    info!("logmode: {}", state);
                    writeln!(out, "logmode: {}", state)?;
                }
                _ => writeln!(out, "Usage: logmode on|off")?,
            },
            "exit" | "quit" => {
                info!("Bye.");
                writeln!(out, "Bye.")?;
                return Ok(ShellAction::Exit);
            }
            _ => {
                info!("Command: {} {}", command, rest.join(" "));
                match self.registry.dispatch(&command, &rest).await {
                    DispatchOutcome::Unknown => {
                        warn!("Unknown command: {}", command);
                        writeln!(out, "Unknown command. Type `help`.")?;
                    }
                    DispatchOutcome::Executed(result) => {
                        if let Err(e) = result {
                            writeln!(out, "Command failed: {}", e)?;
                        }
                        if self.show_logs_after_command {
                            print_tail(&self.logs, LOGMODE_LINES, out)?;
                        }
                    }
                }
            }
        }

        Ok(ShellAction::Continue)
    }
}

/// Print the last `n` buffered log lines between markers.
pub fn print_tail<W: Write>(logs: &LogBuffer, n: usize, out: &mut W) -> io::Result<()> {
    let lines = logs.tail(n);
    if lines.is_empty() {
        return writeln!(out, "(no logs yet)");
    }

    writeln!(out, "---- logs (last {}) ----", lines.len())?;
    for line in &lines {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "---- end ----")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecError;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingExecutor {
        calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    impl CommandExecutor for RecordingExecutor {
        async fn run(&self, program: &str, args: &[String]) -> Result<(), ExecError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec()));
            Ok(())
        }
    }

    fn shell() -> (Shell<RecordingExecutor>, RecordingExecutor, LogBuffer) {
        let executor = RecordingExecutor::default();
        let registry = Arc::new(CommandRegistry::with_builtin(executor.clone()).unwrap());
        let logs = LogBuffer::new(100);
        let shell = Shell::new(registry, logs.clone(), "[server] Listening on UDP port 9097");
        (shell, executor, logs)
    }

    async fn run_line(shell: &mut Shell<RecordingExecutor>, line: &str) -> (ShellAction, String) {
        let mut out = Vec::new();
        let action = shell.handle_line(line, &mut out).await.unwrap();
        (action, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_blank_line_ignored() {
        let (mut shell, executor, _) = shell();
        let (action, output) = run_line(&mut shell, "   ").await;
        assert_eq!(action, ShellAction::Continue);
        assert!(output.is_empty());
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let (mut shell, _, _) = shell();
        let (_, output) = run_line(&mut shell, "HELP").await;
        assert!(output.contains("RPCS Daemon (stdin mode)"));
        assert!(output.contains("Listening on UDP port 9097"));
        assert!(output.contains("  suspend    - systemctl suspend"));
        assert!(output.contains("logmode on|off"));
    }

    #[tokio::test]
    async fn test_exit_and_quit() {
        let (mut shell, _, _) = shell();
        let (action, output) = run_line(&mut shell, "exit").await;
        assert_eq!(action, ShellAction::Exit);
        assert_eq!(output, "Bye.\n");

        let (action, _) = run_line(&mut shell, "Quit").await;
        assert_eq!(action, ShellAction::Exit);
    }

    #[tokio::test]
    async fn test_dispatch_with_args_ignored_by_test() {
        let (mut shell, executor, _) = shell();
        let (action, _) = run_line(&mut shell, "TEST  one   two").await;
        assert_eq!(action, ShellAction::Continue);

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].0, "echo");
        assert_eq!(calls[0].1, vec!["dev Test working ;)"]);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut shell, executor, _) = shell();
        let (action, output) = run_line(&mut shell, "hibernate").await;
        assert_eq!(action, ShellAction::Continue);
        assert_eq!(output, "Unknown command. Type `help`.\n");
        assert!(executor.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logs_default_and_count() {
        let (mut shell, _, logs) = shell();

        let (_, output) = run_line(&mut shell, "logs").await;
        assert_eq!(output, "(no logs yet)\n");

        for i in 0..60 {
            logs.push(format!("line {}", i));
        }

        let (_, output) = run_line(&mut shell, "logs").await;
        assert!(output.starts_with("---- logs (last 50) ----\n"));
        assert!(output.contains("line 59"));
        assert!(!output.contains("line 9\n"));

        let (_, output) = run_line(&mut shell, "logs 3").await;
        assert_eq!(
            output,
            "---- logs (last 3) ----\nline 57\nline 58\nline 59\n---- end ----\n"
        );

        let (_, output) = run_line(&mut shell, "logs many").await;
        assert!(output.starts_with("---- logs (last 50) ----\n"));
    }

    #[tokio::test]
    async fn test_logmode_toggle() {
        let (mut shell, _, logs) = shell();
        logs.push("earlier line");

        let (_, output) = run_line(&mut shell, "logmode").await;
        assert_eq!(output, "Usage: logmode on|off\n");
        assert!(!shell.logmode());

        let (_, output) = run_line(&mut shell, "logmode ON").await;
        assert_eq!(output, "logmode: on\n");
        assert!(shell.logmode());

        let (_, output) = run_line(&mut shell, "suspend").await;
        assert!(output.contains("---- logs (last"));
        assert!(output.contains("earlier line"));

        let (_, output) = run_line(&mut shell, "logmode off").await;
        assert_eq!(output, "logmode: off\n");

        let (_, output) = run_line(&mut shell, "suspend").await;
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_clear_writes_escape() {
        let (mut shell, _, _) = shell();
        let (_, output) = run_line(&mut shell, "clear").await;
        assert_eq!(output, "\x1B[2J\x1B[H");
    }
}
