//! UDP protocol server.
//!
//! Owns the socket and the receive loop. Every datagram goes through the same
//! pipeline:
//!
//! ```text
//! recv ─▶ parse ─▶ timestamp ─▶ MAC ─▶ nonce ─▶ lookup ─▶ dispatch (spawned)
//! ```
//!
//! Any stage can reject; a rejected datagram is logged and dropped. Nothing is
//! ever sent back to the peer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use protocol::{
    current_timestamp, Authenticator, RejectReason, ReplayCache, Request, MAX_DATAGRAM_SIZE,
};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::executor::CommandExecutor;
use crate::registry::CommandRegistry;

/// Errors from starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` was called while the receive loop is running.
    #[error("server is already listening")]
    AlreadyRunning,

    /// The UDP socket could not be bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Not bound.
    Stopped,
    /// Bound and receiving.
    Listening,
}

/// Socket and concurrency settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSettings {
    /// Address to bind.
    pub bind_addr: SocketAddr,
    /// Maximum number of commands running at once.
    pub max_in_flight: usize,
}

impl ServerSettings {
    /// Build settings from the `[server]` config section.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: config.socket_addr()?,
            max_in_flight: config.max_in_flight,
        })
    }
}

/// The per-datagram checks plus dispatch, shared with the receive loop.
struct Pipeline<E: CommandExecutor> {
    authenticator: Authenticator,
    replay: ReplayCache,
    registry: Arc<CommandRegistry<E>>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl<E: CommandExecutor> Pipeline<E> {
    fn evaluate(&self, datagram: &[u8], now: i64) -> Result<Request, RejectReason> {
        let request = Request::parse(datagram)?;
        self.admit(&request, now)?;
        Ok(request)
    }

    /// Checks that run once the datagram has parsed.
    fn admit(&self, request: &Request, now: i64) -> Result<(), RejectReason> {
        self.authenticator.verify(request, now)?;

        // Only authenticated requests may record a nonce.
        if !self.replay.accept(&request.nonce, now) {
            return Err(RejectReason::Replayed {
                nonce: request.nonce.clone(),
            });
        }

        if self.registry.lookup(&request.command).is_none() {
            return Err(RejectReason::UnknownCommand {
                command: request.command.clone(),
            });
        }

        Ok(())
    }

    fn handle(self: &Arc<Self>, datagram: &[u8], peer: SocketAddr, tracker: &TaskTracker) {
        let request = match Request::parse(datagram) {
            Ok(request) => request,
            Err(reason) => {
                log_rejection(&reason, peer, None);
                return;
            }
        };

        if let Err(reason) = self.admit(&request, current_timestamp()) {
            log_rejection(&reason, peer, Some(&request.command));
            return;
        }

        info!(
            "dispatch from {} cmd={} args={:?}",
            peer, request.command, request.args
        );

        let pipeline = Arc::clone(self);
        tracker.spawn(async move {
            let permits = Arc::clone(&pipeline.permits);
            if permits.available_permits() == 0 {
                debug!(
                    "cmd={} from {} waiting: {} commands already running",
                    request.command, peer, pipeline.max_in_flight
                );
            }
            let Ok(_permit) = permits.acquire_owned().await else {
                error!("dispatch permits closed, dropping cmd={}", request.command);
                return;
            };

            let outcome = pipeline
                .registry
                .dispatch(&request.command, &request.args)
                .await;
            if let Err(reason) = outcome.into_result(&request.command) {
                warn!("dispatch from {} failed ({}): {}", peer, reason.label(), reason);
            }
        });
    }
}

fn log_rejection(reason: &RejectReason, peer: SocketAddr, command: Option<&str>) {
    match (reason, command) {
        (RejectReason::Malformed(_), _) => {
            debug!("ignoring junk packet from {}: {}", peer, reason)
        }
        (_, Some(command)) => warn!(
            "drop ({}) from {} cmd={}: {}",
            reason.label(),
            peer,
            command,
            reason
        ),
        (_, None) => warn!("drop ({}) from {}: {}", reason.label(), peer, reason),
    }
}

/// Authenticated UDP command server.
pub struct ProtocolServer<E: CommandExecutor> {
    settings: ServerSettings,
    pipeline: Arc<Pipeline<E>>,
    state: Arc<RwLock<ServerState>>,
    shutdown_token: CancellationToken,
    tracker: TaskTracker,
    recv_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl<E: CommandExecutor> ProtocolServer<E> {
    /// Create a stopped server.
    ///
    /// The replay cache lives as long as the server, so nonces stay
    /// remembered across a stop and restart.
    pub fn new(
        settings: ServerSettings,
        authenticator: Authenticator,
        registry: Arc<CommandRegistry<E>>,
    ) -> Self {
        let max_in_flight = settings.max_in_flight.max(1);
        let replay = ReplayCache::new(authenticator.replay_ttl_secs());

        Self {
            settings,
            pipeline: Arc::new(Pipeline {
                authenticator,
                replay,
                registry,
                permits: Arc::new(Semaphore::new(max_in_flight)),
                max_in_flight,
            }),
            state: Arc::new(RwLock::new(ServerState::Stopped)),
            shutdown_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            recv_task: None,
            local_addr: None,
        }
    }

    /// Bind the socket and spawn the receive loop.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.recv_task.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let addr = self.settings.bind_addr;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.shutdown_token = CancellationToken::new();
        self.tracker = TaskTracker::new();

        let task = tokio::spawn(receive_loop(
            socket,
            Arc::clone(&self.pipeline),
            self.shutdown_token.clone(),
            self.tracker.clone(),
        ));
        self.recv_task = Some(task);
        self.local_addr = Some(local_addr);
        *self.state.write().await = ServerState::Listening;

        info!("listening on UDP {}", local_addr);
        Ok(local_addr)
    }

    /// Stop receiving and wait for running commands to finish.
    ///
    /// Calling this on a stopped server does nothing.
    pub async fn shutdown(&mut self) {
        let Some(task) = self.recv_task.take() else {
            return;
        };

        info!("Stopping UDP server...");
        self.shutdown_token.cancel();

        if let Err(e) = task.await {
            error!("receive loop ended abnormally: {}", e);
        }

        self.tracker.close();
        self.tracker.wait().await;

        self.local_addr = None;
        *self.state.write().await = ServerState::Stopped;
        info!("UDP server stopped");
    }

    /// Run the datagram checks without dispatching.
    pub fn evaluate(&self, datagram: &[u8], now: i64) -> Result<Request, RejectReason> {
        self.pipeline.evaluate(datagram, now)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServerState {
        *self.state.read().await
    }

    /// Bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns true while the receive loop is running.
    pub fn is_running(&self) -> bool {
        self.recv_task.is_some()
    }

    /// Number of nonces currently remembered.
    pub fn remembered_nonces(&self) -> usize {
        self.pipeline.replay.len()
    }
}

impl<E: CommandExecutor> Drop for ProtocolServer<E> {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn receive_loop<E: CommandExecutor>(
    socket: UdpSocket,
    pipeline: Arc<Pipeline<E>>,
    shutdown_token: CancellationToken,
    tracker: TaskTracker,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            biased;
            _ = shutdown_token.cancelled() => {
                debug!("receive loop received shutdown signal");
                break;
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => pipeline.handle(&buf[..len], peer, &tracker),
                Err(e) => error!("UDP receive error: {}", e),
            }
        }
    }
}
