//! # Storage Engine Interface
//!
//! ## Design Principles
//!
//! 1. **Strategy Pattern**: Abstract the engine behind a trait so different
//!    implementations can be swapped without touching the caller.
//! 2. **Binary-Safe API**: Keys/values are byte buffers, matching the wire
//!    protocol's treatment of both as opaque strings.
//! 3. **Explicit TTL**: Expiration is exposed via dedicated methods to keep
//!    the hot read path minimal.

use std::sync::Arc;

use atomkv_common::AtomKvResult;

/// TTL query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlStatus {
    /// Key does not exist or is already expired.
    Missing,
    /// Key exists but has no expiration set.
    NoExpiry,
    /// Key expires in the given number of milliseconds.
    ExpiresIn(i64),
}

/// Coarse type classification reported by `TYPE`.
///
/// A key with a TTL reports `TtlKey` regardless of whether its value would
/// otherwise parse as a number; this mirrors the classification rule this
/// store uses and is intentionally not a Redis-compatible `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    None,
    String,
    Number,
    TtlKey,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::None => "none",
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::TtlKey => "ttl_key",
        }
    }
}

/// Strategy pattern: the engine behavior surface used by every adapter.
///
/// Every mutating method here is responsible for keeping the durable log
/// (when enabled) in sync with the map in the same call; callers never see
/// a mutation that is observable before its log record is enqueued.
pub trait Engine: Send + Sync {
    /// Returns the value for a key, or `None` if missing or expired.
    fn get(&self, key: &[u8]) -> Option<Arc<[u8]>>;

    /// Inserts or replaces a key, optionally with a TTL in milliseconds.
    fn set(&self, key: &[u8], value: &[u8], ttl_ms: Option<u64>);

    /// Removes a key. Returns true if a live entry was removed.
    fn del(&self, key: &[u8]) -> bool;

    /// Returns true if the key exists and has not expired.
    fn exists(&self, key: &[u8]) -> bool;

    /// Returns the TTL state for a key.
    fn ttl(&self, key: &[u8]) -> TtlStatus;

    /// Clears a key's TTL. Returns true if an existing key's TTL was cleared.
    fn persist(&self, key: &[u8]) -> bool;

    /// Sets a key's TTL to `seconds` from now. Returns true if the key exists.
    fn expire(&self, key: &[u8], seconds: u64) -> bool;

    /// Appends `suffix` to a key's value, creating it if missing. Returns
    /// the new length in bytes.
    fn append(&self, key: &[u8], suffix: &[u8]) -> usize;

    /// Increments a key's value as a signed 64-bit integer, creating it at 1
    /// if missing. Fails if the existing value does not parse as an integer.
    fn incr(&self, key: &[u8]) -> AtomKvResult<i64>;

    /// Decrements a key's value as a signed 64-bit integer, creating it at -1
    /// if missing. Fails if the existing value does not parse as an integer.
    fn decr(&self, key: &[u8]) -> AtomKvResult<i64>;

    /// Returns the byte length of a key's value, 0 if missing or expired.
    fn strlen(&self, key: &[u8]) -> usize;

    /// Classifies a key's value.
    fn key_type(&self, key: &[u8]) -> TypeTag;

    /// Returns all live keys matching a `*`-glob pattern.
    fn keys(&self, pattern: &str) -> Vec<Box<[u8]>>;

    /// Returns the number of live keys.
    fn key_count(&self) -> usize;

    /// Returns values for each key in order, `None` where missing or expired.
    fn mget(&self, keys: &[&[u8]]) -> Vec<Option<Arc<[u8]>>>;

    /// Returns every live key and its value. Read-only: does not touch
    /// `hits`/`misses` or eviction recency, since it is not a client `GET`.
    fn snapshot(&self) -> Vec<(Box<[u8]>, Arc<[u8]>)>;

    /// Sets every pair. The caller is responsible for rejecting odd-length
    /// input before calling this.
    fn mset(&self, pairs: &[(&[u8], &[u8])]);

    /// Renames `src` to `dst`, overwriting `dst` if present. Returns true if
    /// `src` existed and was live.
    fn rename(&self, src: &[u8], dst: &[u8]) -> bool;

    /// Removes every key.
    fn flushall(&self);

    /// Returns `(hits, misses)` accumulated since startup.
    fn stats(&self) -> (u64, u64);
}
