//! Datagram wire format.
//!
//! # Format
//!
//! Each UDP payload is UTF-8 text, fields joined by `|`:
//!
//! ```text
//! RPCS|<unixTimestampSeconds>|<nonce>|<command>|<arg1>|...|<argN>|<hmacSha256Hex>
//! ```
//!
//! - field 0: magic literal `RPCS`
//! - field 1: timestamp, base-10 seconds since the Unix epoch
//! - field 2: nonce, opaque and chosen by the sender
//! - field 3: command name (matched case-insensitively)
//! - fields 4..N-1: optional arguments
//! - last field: hex HMAC-SHA256 over every preceding field, re-joined with `|`

use rand::RngCore;

use crate::error::RejectReason;

/// Magic tag opening every datagram.
pub const MAGIC: &str = "RPCS";

/// Field separator.
pub const DELIMITER: char = '|';

/// Magic, timestamp, nonce, command and MAC.
pub const MIN_FIELDS: usize = 5;

/// Receive buffer size; longer datagrams are truncated by the socket.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Bytes of randomness in a generated nonce.
const NONCE_BYTES: usize = 16;

/// A parsed request datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Claimed send time, seconds since the Unix epoch.
    pub timestamp: i64,
    /// Replay-detection token.
    pub nonce: String,
    /// Lower-cased command name.
    pub command: String,
    /// Command arguments in wire order.
    pub args: Vec<String>,
    /// Hex MAC as received (either case).
    pub mac: String,
    /// Every field except the MAC, exactly as received.
    raw_fields: Vec<String>,
}

impl Request {
    /// Decode a raw datagram.
    ///
    /// Invalid UTF-8 is reported as [`RejectReason::Malformed`] like any other
    /// shape error.
    pub fn parse(datagram: &[u8]) -> Result<Self, RejectReason> {
        let text = std::str::from_utf8(datagram)
            .map_err(|e| RejectReason::Malformed(format!("invalid utf-8: {}", e)))?;
        Self::parse_str(text)
    }

    /// Decode a datagram that is already text.
    pub fn parse_str(text: &str) -> Result<Self, RejectReason> {
        let mut fields: Vec<String> = text.trim().split(DELIMITER).map(str::to_string).collect();

        if fields.len() < MIN_FIELDS {
            return Err(RejectReason::Malformed(format!(
                "expected at least {} fields, got {}",
                MIN_FIELDS,
                fields.len()
            )));
        }

        if fields[0] != MAGIC {
            return Err(RejectReason::Malformed(format!(
                "invalid magic: expected {}, got {:?}",
                MAGIC, fields[0]
            )));
        }

        let timestamp = fields[1].parse::<i64>().map_err(|_| {
            RejectReason::Malformed(format!("timestamp is not an integer: {:?}", fields[1]))
        })?;

        // Length was checked above, so the MAC is always present.
        let mac = fields.pop().unwrap_or_default();
        let nonce = fields[2].clone();
        let command = fields[3].to_lowercase();
        let args = fields[4..].to_vec();

        Ok(Self {
            timestamp,
            nonce,
            command,
            args,
            mac,
            raw_fields: fields,
        })
    }

    /// Every field except the trailing MAC, in wire order.
    pub fn raw_fields(&self) -> &[String] {
        &self.raw_fields
    }

    /// The exact string that was MAC'd by the sender.
    pub fn canonical(&self) -> String {
        self.raw_fields.join(&DELIMITER.to_string())
    }
}

/// Build the canonical (unsigned) form of a request.
///
/// The command is written as given; senders are free to use any case since
/// the MAC covers the bytes on the wire, not the normalized name.
pub fn canonical_fields<S: AsRef<str>>(
    timestamp: i64,
    nonce: &str,
    command: &str,
    args: &[S],
) -> String {
    let mut out = format!(
        "{MAGIC}{d}{timestamp}{d}{nonce}{d}{command}",
        d = DELIMITER
    );
    for arg in args {
        out.push(DELIMITER);
        out.push_str(arg.as_ref());
    }
    out
}

/// Generate a random hex nonce for outgoing requests.
pub fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
