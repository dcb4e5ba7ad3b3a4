//! Request authentication: shared secret, timestamp window and HMAC-SHA256.
//!
//! A request is authentic when its timestamp lies within the clock-skew
//! tolerance of the server clock and its MAC equals
//! `HMAC-SHA256(secret, canonical)` where `canonical` is every field before the
//! MAC re-joined with `|`. The MAC is compared in constant time.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ProtocolError, RejectReason, Result};
use crate::wire::{canonical_fields, Request, DELIMITER};

type HmacSha256 = Hmac<Sha256>;

/// Default clock-skew tolerance in seconds.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;

/// The pre-shared key.
///
/// Never printed: the `Debug` output is redacted.
#[derive(Clone)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Wrap a secret, rejecting blank values.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = secret.into();
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::EmptySecret);
        }
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Verifies timestamps and MACs, and signs outgoing requests.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SharedSecret,
    skew_secs: u64,
}

impl Authenticator {
    /// Create an authenticator with the given skew tolerance in seconds.
    pub fn new(secret: SharedSecret, skew_secs: u64) -> Result<Self> {
        if skew_secs == 0 {
            return Err(ProtocolError::InvalidSkew);
        }
        Ok(Self { secret, skew_secs })
    }

    /// Clock-skew tolerance in seconds.
    pub fn skew_secs(&self) -> u64 {
        self.skew_secs
    }

    /// How long nonces must be remembered: twice the skew, so a nonce cannot
    /// be reused anywhere inside the timestamp window.
    pub fn replay_ttl_secs(&self) -> u64 {
        self.skew_secs.saturating_mul(2)
    }

    /// Run both checks, timestamp first.
    pub fn verify(&self, request: &Request, now: i64) -> std::result::Result<(), RejectReason> {
        self.check_timestamp(request.timestamp, now)?;
        self.check_mac(request)
    }

    /// Accept when `|now - timestamp| <= skew`.
    pub fn check_timestamp(&self, timestamp: i64, now: i64) -> std::result::Result<(), RejectReason> {
        if now.abs_diff(timestamp) > self.skew_secs {
            return Err(RejectReason::Stale { timestamp, now });
        }
        Ok(())
    }

    /// Recompute the MAC over the canonical fields and compare it with the
    /// received one. Hex of either case is accepted.
    pub fn check_mac(&self, request: &Request) -> std::result::Result<(), RejectReason> {
        let supplied = hex::decode(&request.mac).map_err(|_| RejectReason::BadMac)?;

        let mut mac = self.keyed();
        for (i, field) in request.raw_fields().iter().enumerate() {
            if i > 0 {
                mac.update(&[DELIMITER as u8]);
            }
            mac.update(field.as_bytes());
        }

        mac.verify_slice(&supplied).map_err(|_| RejectReason::BadMac)
    }

    /// Lower-case hex HMAC of an arbitrary canonical string.
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = self.keyed();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build a complete signed datagram.
    pub fn encode_signed<S: AsRef<str>>(
        &self,
        timestamp: i64,
        nonce: &str,
        command: &str,
        args: &[S],
    ) -> String {
        let canonical = canonical_fields(timestamp, nonce, command, args);
        let mac = self.sign(&canonical);
        format!("{}{}{}", canonical, DELIMITER, mac)
    }

    fn keyed(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size")
    }
}

/// Current Unix time in seconds. A clock set before 1970 reads as 0.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
