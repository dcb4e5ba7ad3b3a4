//! Nonce cache for replay suppression.
//!
//! Each accepted nonce is remembered with the time it was seen. Entries older
//! than the TTL are purged lazily on every [`ReplayCache::accept`] call; there
//! is no background timer.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Time-bounded set of recently seen nonces.
///
/// Safe to share between tasks: the insert-if-absent step uses the DashMap
/// entry API, which holds the shard lock for the key, so two concurrent
/// callers can never both see the same nonce as fresh.
#[derive(Debug)]
pub struct ReplayCache {
    seen: DashMap<String, i64>,
    ttl_secs: u64,
}

impl ReplayCache {
    /// Create an empty cache whose entries live for `ttl_secs`.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            seen: DashMap::new(),
            ttl_secs,
        }
    }

    /// Entry lifetime in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Record `nonce` at time `now`.
    ///
    /// Returns `true` if the nonce was fresh, `false` if it was already seen
    /// within the TTL.
    pub fn accept(&self, nonce: &str, now: i64) -> bool {
        self.purge(now);

        match self.seen.entry(nonce.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            // A concurrent purge may not have reached this entry yet.
            Entry::Occupied(mut slot) if self.expired(*slot.get(), now) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Number of nonces currently remembered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if no nonces are remembered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn purge(&self, now: i64) {
        self.seen.retain(|_, seen| !self.expired(*seen, now));
    }

    fn expired(&self, seen: i64, now: i64) -> bool {
        now >= seen && now.abs_diff(seen) >= self.ttl_secs
    }
}
