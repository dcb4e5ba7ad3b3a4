//! # RPCS Protocol Library
//!
//! Wire format, authentication and replay protection for RPCS, a one-way UDP
//! protocol that lets a holder of a shared secret trigger host power actions.
//!
//! ## Overview
//!
//! - **Wire Format**: `|`-delimited UTF-8 datagrams opened by the `RPCS` magic
//! - **Authentication**: HMAC-SHA256 over the canonical fields plus a
//!   clock-skew window on the embedded timestamp
//! - **Replay Protection**: a lazily purged nonce cache
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Request::parse             │  magic, field count, timestamp
//! ├─────────────────────────────────────────┤
//! │         Authenticator::verify           │  skew window, then HMAC
//! ├─────────────────────────────────────────┤
//! │          ReplayCache::accept            │  nonce freshness
//! ├─────────────────────────────────────────┤
//! │          command dispatch (daemon)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every stage reports a [`RejectReason`] on failure. Nothing is ever sent
//! back to the peer.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Authenticator, ReplayCache, Request, SharedSecret};
//!
//! let secret = SharedSecret::new("s3cr3t").unwrap();
//! let auth = Authenticator::new(secret, 60).unwrap();
//! let cache = ReplayCache::new(auth.replay_ttl_secs());
//!
//! let now = 1_700_000_000;
//! let datagram = auth.encode_signed::<&str>(now, "abc123", "suspend", &[]);
//!
//! let request = Request::parse(datagram.as_bytes()).unwrap();
//! auth.verify(&request, now).unwrap();
//! assert!(cache.accept(&request.nonce, now));
//! assert!(!cache.accept(&request.nonce, now + 5));
//! ```
//!
//! ## Modules
//!
//! - [`wire`]: Datagram parsing and canonical form
//! - [`auth`]: Shared secret, skew window and HMAC verification
//! - [`replay`]: Nonce cache
//! - [`error`]: Error types

pub mod auth;
pub mod error;
pub mod replay;
pub mod wire;

pub use auth::{current_timestamp, Authenticator, SharedSecret, DEFAULT_CLOCK_SKEW_SECS};
pub use error::{ProtocolError, RejectReason, Result};
pub use replay::ReplayCache;
pub use wire::{
    canonical_fields, random_nonce, Request, DELIMITER, MAGIC, MAX_DATAGRAM_SIZE, MIN_FIELDS,
};
