//! Command registry: name and alias lookup plus dispatch.
//!
//! The registry is filled once at startup and only read afterwards, so it is
//! shared between tasks behind an `Arc` without locking.

use std::collections::HashMap;

use protocol::RejectReason;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::commands::{self, CommandSpec};
use crate::executor::{CommandExecutor, ExecError};

/// Errors raised while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A name or alias is already taken.
    #[error("duplicate command name: {0}")]
    DuplicateName(String),
}

/// Result of a dispatch attempt.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The command was found and run.
    Executed(Result<(), ExecError>),
    /// No command answers to the name.
    Unknown,
}

impl DispatchOutcome {
    /// Returns true if the command ran successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Executed(Ok(())))
    }

    /// Fold into the pipeline's rejection type.
    pub fn into_result(self, command: &str) -> Result<(), RejectReason> {
        match self {
            DispatchOutcome::Executed(Ok(())) => Ok(()),
            DispatchOutcome::Executed(Err(e)) => Err(RejectReason::ExecutionFailure {
                command: command.to_string(),
                detail: e.to_string(),
            }),
            DispatchOutcome::Unknown => Err(RejectReason::UnknownCommand {
                command: command.to_string(),
            }),
        }
    }
}

/// Maps command names and aliases to actions.
pub struct CommandRegistry<E: CommandExecutor> {
    commands: Vec<CommandSpec>,
    index: HashMap<String, usize>,
    executor: E,
}

impl<E: CommandExecutor> CommandRegistry<E> {
    /// Create an empty registry.
    pub fn new(executor: E) -> Self {
        Self {
            commands: Vec::new(),
            index: HashMap::new(),
            executor,
        }
    }

    /// Create a registry holding the built-in command table.
    pub fn with_builtin(executor: E) -> Result<Self, RegistryError> {
        let mut registry = Self::new(executor);
        for spec in commands::builtin() {
            registry.register(spec)?;
        }
        Ok(registry)
    }

    /// Add a command. Nothing is inserted if any of its names collide.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), RegistryError> {
        let mut keys: Vec<String> = Vec::new();
        for name in spec.names() {
            let key = name.to_lowercase();
            if self.index.contains_key(&key) || keys.contains(&key) {
                return Err(RegistryError::DuplicateName(key));
            }
            keys.push(key);
        }

        let slot = self.commands.len();
        for key in keys {
            self.index.insert(key, slot);
        }
        debug!("registered command: {}", spec.name);
        self.commands.push(spec);
        Ok(())
    }

    /// Find a command by name or alias, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&CommandSpec> {
        self.index
            .get(&name.to_lowercase())
            .map(|&slot| &self.commands[slot])
    }

    /// Run the named command.
    ///
    /// Failures are logged here, with a privilege hint when the exit status
    /// suggests polkit refused the action.
    pub async fn dispatch(&self, name: &str, args: &[String]) -> DispatchOutcome {
        let Some(spec) = self.lookup(name) else {
            return DispatchOutcome::Unknown;
        };

        if !spec.forward_args && !args.is_empty() {
            debug!("{} takes no arguments, ignoring {:?}", spec.name, args);
        }

        let result = self.executor.run(spec.program, &spec.argv(args)).await;
        if let Err(e) = &result {
            error!("command {} failed: {}", spec.name, e);
            if e.needs_privilege_hint() {
                warn!("{} may require sudo/polkit", spec.name);
            }
        }
        DispatchOutcome::Executed(result)
    }

    /// Registered commands in registration order.
    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Number of registered commands, not counting aliases.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// One line per command, with aliases when present.
    pub fn help_text(&self) -> String {
        self.commands
            .iter()
            .map(|spec| {
                if spec.aliases.is_empty() {
                    format!("  {:<10} - {}", spec.name, spec.description)
                } else {
                    format!(
                        "  {:<10} - {} (aliases: {})",
                        spec.name,
                        spec.description,
                        spec.aliases.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
