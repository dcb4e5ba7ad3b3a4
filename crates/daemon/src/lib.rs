//! # RPCS Daemon Library
//!
//! This crate provides the daemon side of RPCS: a UDP listener that accepts
//! authenticated requests and runs host power actions.
//!
//! ## Overview
//!
//! The daemon runs on the machine to be controlled. It provides:
//!
//! - **Protocol Server**: UDP receive loop running the authentication pipeline
//! - **Command Registry**: Named actions (`suspend`, `reboot`, `poweroff`, `test`)
//! - **Interactive Shell**: Local prompt for running commands and reading logs
//! - **Client Helper**: Sign and send requests to another daemon
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          rpcs binary                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────────────┐          ┌────────────────────────┐   │
//! │  │   Interactive Shell  │          │    Protocol Server     │   │
//! │  └──────────┬───────────┘          └───────────┬────────────┘   │
//! │             │                                  │                │
//! │  ┌──────────▼──────────────────────────────────▼─────────────┐  │
//! │  │                    Command Registry                       │  │
//! │  └───────────────────────────┬───────────────────────────────┘  │
//! │                              │                                  │
//! │  ┌───────────────────────────▼───────────────────────────────┐  │
//! │  │                 CommandExecutor (systemctl)               │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use daemon::protocol::{Authenticator, SharedSecret};
//! use daemon::{CommandRegistry, ProtocolServer, ServerSettings, SystemExecutor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(CommandRegistry::with_builtin(SystemExecutor::new())?);
//!     let auth = Authenticator::new(SharedSecret::new("s3cr3t")?, 60)?;
//!     let settings = ServerSettings {
//!         bind_addr: "0.0.0.0:9097".parse()?,
//!         max_in_flight: 4,
//!     };
//!
//!     let mut server = ProtocolServer::new(settings, auth, registry);
//!     server.start().await?;
//!
//!     // Wait for a shutdown signal...
//!     daemon::signal::wait_for_shutdown().await?;
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`logging`]: Subscriber setup and the in-memory log buffer
//! - [`executor`]: Process execution seam
//! - [`commands`]: Built-in command table
//! - [`registry`]: Name lookup and dispatch
//! - [`server`]: UDP receive loop and request pipeline
//! - [`shell`]: Interactive prompt
//! - [`client`]: Signed request sender
//! - [`host`]: Startup environment checks
//! - [`signal`]: SIGINT/SIGTERM handling

pub mod client;
pub mod commands;
pub mod config;
pub mod executor;
pub mod host;
pub mod logging;
pub mod registry;
pub mod server;
pub mod shell;
pub mod signal;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export execution types for convenience
pub use commands::CommandSpec;
pub use executor::{CommandExecutor, ExecError, SystemExecutor};
pub use registry::{CommandRegistry, DispatchOutcome, RegistryError};

// Re-export server types for convenience
pub use server::{ProtocolServer, ServerError, ServerSettings, ServerState};

// Re-export UI types for convenience
pub use logging::{LogBuffer, LogSettings};
pub use shell::{Shell, ShellAction};
