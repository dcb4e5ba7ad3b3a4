//! Error types for the protocol crate.

use thiserror::Error;

/// Why a datagram was dropped.
///
/// Every stage of the request pipeline reports its outcome as
/// `Result<_, RejectReason>`. None of these are ever sent back to the network
/// peer; the server logs them and moves on to the next datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Wrong magic, too few fields, non-numeric timestamp or invalid UTF-8.
    #[error("malformed datagram: {0}")]
    Malformed(String),

    /// Timestamp outside the clock-skew window.
    #[error("stale timestamp: ts={timestamp} now={now}")]
    Stale {
        /// Timestamp claimed by the request.
        timestamp: i64,
        /// Server time at verification.
        now: i64,
    },

    /// Nonce already seen within the replay TTL.
    #[error("replayed nonce: {nonce}")]
    Replayed {
        /// The duplicate nonce.
        nonce: String,
    },

    /// The supplied MAC does not match the canonical request.
    #[error("bad mac")]
    BadMac,

    /// Request authenticated but names no registered command.
    #[error("unknown command: {command}")]
    UnknownCommand {
        /// The lower-cased command name.
        command: String,
    },

    /// The command ran but its action reported failure.
    #[error("execution failed for {command}: {detail}")]
    ExecutionFailure {
        /// The lower-cased command name.
        command: String,
        /// Executor error text.
        detail: String,
    },
}

impl RejectReason {
    /// Short tag used in log lines (`drop (stale)`, `drop (bad-mac)`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Malformed(_) => "malformed",
            RejectReason::Stale { .. } => "stale",
            RejectReason::Replayed { .. } => "replay",
            RejectReason::BadMac => "bad-mac",
            RejectReason::UnknownCommand { .. } => "unknown-command",
            RejectReason::ExecutionFailure { .. } => "exec-failed",
        }
    }
}

/// Errors raised while setting up protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The shared secret was empty or only whitespace.
    #[error("shared secret must not be empty")]
    EmptySecret,

    /// A zero clock-skew tolerance would reject every request.
    #[error("clock skew tolerance must be at least 1 second")]
    InvalidSkew,
}

/// Result type alias for protocol setup operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
