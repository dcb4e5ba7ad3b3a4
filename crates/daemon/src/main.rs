//! RPCS Daemon
//!
//! Remote power control over authenticated UDP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::host::{self, EXIT_COMMAND_NOT_FOUND};
use daemon::logging::{self, LogBuffer, LogSettings};
use daemon::protocol::Authenticator;
use daemon::registry::{CommandRegistry, DispatchOutcome};
use daemon::server::{ProtocolServer, ServerSettings};
use daemon::shell::{self, Shell};
use daemon::{client, signal, SystemExecutor};
use tokio_util::sync::CancellationToken;

/// RPCS Daemon - trigger host power actions over authenticated UDP.
#[derive(Parser, Debug)]
#[command(name = "rpcs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `shell`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Interactive shell with the UDP server in the background
    Shell,

    /// Run only the UDP server until SIGINT or SIGTERM
    Serve,

    /// Run one command locally and exit
    Run {
        /// Command name
        command: String,

        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Send a signed request to a running daemon
    Send {
        /// Command name
        command: String,

        /// Arguments passed to the command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Daemon host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Daemon UDP port (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List registered commands
    Commands,
}

type Registry = CommandRegistry<SystemExecutor>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Shell);

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Apply environment variable overrides
    let notes = config.apply_env_overrides();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Validate configuration
    config.validate()?;

    // Initialize tracing
    let buffer = LogBuffer::default();
    let guard = logging::init(
        &LogSettings {
            level: config.logging.level.clone(),
            file: config.logging.file_path(),
            console: matches!(command, Commands::Serve),
        },
        buffer.clone(),
    );

    for note in &notes {
        tracing::warn!("{}", note);
    }
    if let Some(path) = &cli.config {
        tracing::info!("Using config file: {:?}", path);
    }

    let code = match run(command, config, buffer).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    // Flush the file writer before exiting. Exiting explicitly also avoids
    // waiting on a pending stdin read.
    drop(guard);
    std::process::exit(code);
}

async fn run(command: Commands, config: Config, buffer: LogBuffer) -> anyhow::Result<i32> {
    match command {
        Commands::Commands => {
            let registry = Registry::with_builtin(SystemExecutor::new())?;
            println!("Commands:\n{}", registry.help_text());
            Ok(0)
        }
        Commands::Send {
            command,
            args,
            host,
            port,
        } => {
            let auth = authenticator(&config)?.context(
                "no shared secret configured (set RPCS_SECRET or [server].secret)",
            )?;
            let target = client::resolve(&host, port.unwrap_or(config.server.port)).await?;
            client::send_command(&auth, target, &command, &args).await?;
            println!("Sent {} to {}", command.to_lowercase(), target);
            Ok(0)
        }
        Commands::Run { command, args } => {
            if let Some(code) = check_host() {
                return Ok(code);
            }
            let registry = Registry::with_builtin(SystemExecutor::new())?;
            Ok(run_once(&registry, &buffer, &command, &args).await)
        }
        Commands::Serve => {
            if let Some(code) = check_host() {
                return Ok(code);
            }
            run_headless(&config).await
        }
        Commands::Shell => {
            if let Some(code) = check_host() {
                return Ok(code);
            }
            run_shell(&config, buffer).await
        }
    }
}

/// Warn on non-Linux hosts; refuse to run without `systemctl`.
fn check_host() -> Option<i32> {
    if !host::is_linux() {
        tracing::warn!("Non-Linux OS detected. `systemctl` calls may fail.");
    }
    if !host::command_exists("systemctl") {
        tracing::error!("`systemctl` not found in PATH. Aborting.");
        eprintln!("Error: `systemctl` not found in PATH");
        return Some(EXIT_COMMAND_NOT_FOUND);
    }
    None
}

/// Build the authenticator, or `None` when no secret is configured.
fn authenticator(config: &Config) -> anyhow::Result<Option<Authenticator>> {
    config
        .server
        .shared_secret()
        .map(|secret| Authenticator::new(secret, config.server.clock_skew_secs))
        .transpose()
        .map_err(Into::into)
}

fn build_server(
    config: &Config,
    registry: Arc<Registry>,
) -> anyhow::Result<Option<ProtocolServer<SystemExecutor>>> {
    let Some(auth) = authenticator(config)? else {
        return Ok(None);
    };
    let settings = ServerSettings::from_config(&config.server)?;
    Ok(Some(ProtocolServer::new(settings, auth, registry)))
}

/// Dispatch a single command and report the exit code.
async fn run_once(
    registry: &Registry,
    buffer: &LogBuffer,
    command: &str,
    args: &[String],
) -> i32 {
    tracing::info!("One-shot command: {} {}", command, args.join(" "));

    let code = match registry.dispatch(command, args).await {
        DispatchOutcome::Unknown => {
            tracing::error!("Unknown command: {}", command);
            eprintln!("Unknown command: {}", command);
            println!(
                "Usage:\n  rpcs run <command> [args...]\nCommands:\n{}",
                registry.help_text()
            );
            return 1;
        }
        DispatchOutcome::Executed(Ok(())) => 0,
        DispatchOutcome::Executed(Err(e)) => {
            eprintln!("Command failed: {}", e);
            1
        }
    };

    if std::env::var("RPCS_SHOW_LOGS").as_deref() == Ok("1") {
        if let Err(e) = shell::print_tail(buffer, shell::LOGMODE_LINES, &mut std::io::stdout()) {
            tracing::warn!("Failed to print logs: {}", e);
        }
    }
    code
}

/// Run the UDP server until a shutdown signal.
async fn run_headless(config: &Config) -> anyhow::Result<i32> {
    let registry = Arc::new(Registry::with_builtin(SystemExecutor::new())?);
    let Some(mut server) = build_server(config, registry)? else {
        anyhow::bail!("no shared secret configured (set RPCS_SECRET or [server].secret)");
    };

    server.start().await?;

    // Wait for shutdown signal (SIGTERM or SIGINT)
    signal::wait_for_shutdown().await?;
    tracing::info!("Shutting down daemon...");

    server.shutdown().await;
    Ok(0)
}

/// Run the interactive shell, with the UDP server when a secret is set.
async fn run_shell(config: &Config, buffer: LogBuffer) -> anyhow::Result<i32> {
    let registry = Arc::new(Registry::with_builtin(SystemExecutor::new())?);
    let mut server = build_server(config, Arc::clone(&registry))?;

    let status = match server.as_mut() {
        Some(server) => match server.start().await {
            Ok(addr) => format!("[server] Listening for packets on UDP {}", addr),
            Err(e) => {
                tracing::error!("UDP server not started: {}", e);
                format!("[server] Not running ({})", e)
            }
        },
        None => {
            tracing::info!("UDP server not started (RPCS_SECRET missing)");
            "[server] Not running (RPCS_SECRET missing)".to_string()
        }
    };

    let shutdown_token = CancellationToken::new();
    let signal_task = signal::cancel_on_signal(shutdown_token.clone());

    let mut shell = Shell::new(Arc::clone(&registry), buffer, status);
    let result = shell.run_stdin(shutdown_token.clone()).await;

    shutdown_token.cancel();
    let _ = signal_task.await;
    tracing::info!("Shutting down daemon...");

    if let Some(server) = server.as_mut() {
        server.shutdown().await;
    }

    result.context("Shell input failed")?;
    Ok(0)
}
