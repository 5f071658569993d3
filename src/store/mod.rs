// Behavioral state store — backend-agnostic async interface.
//
// Everything the extractor knows about recent behavior lives behind this
// trait: velocity counters, fan-in sets, follow edges, timing lists. All
// methods are async so both the in-memory backend (MemoryStore) and a
// networked backend (Redis-shaped: the key layout maps 1:1 onto GET/INCR/
// SADD/SCARD/RPUSH/LTRIM) fit behind a single interface. Callers hold an
// `Arc<dyn StateStore>` and never see which backend they're on.
//
// Counters are fixed-window: the TTL is set when the counter is created and
// is NOT refreshed by later increments, so a counter lives exactly one
// window from its first event. A burst spanning a window boundary can be
// under-counted; that imprecision is accepted. Sets and lists instead
// refresh their TTL on every write, so an identifier's history stays alive
// for as long as the identifier stays active.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors from the state backend.
///
/// These are transient infrastructure failures. The feature extractor
/// consumes them internally (degrading the affected feature to a neutral
/// value); they are never surfaced to scoring callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key exists but holds a different value shape than the operation
    /// expects (e.g. a set-add against a counter key).
    #[error("wrong value type for key {key}: expected {expected}")]
    WrongType { key: String, expected: &'static str },

    /// The backend itself failed (connection loss, timeout at the backend,
    /// serialization failure in a networked implementation).
    #[error("state backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-key atomic primitives over shared behavioral state.
///
/// Every operation is atomic with respect to its key; there are no
/// cross-key transactions. Expired keys behave exactly like absent keys.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a scalar value. Missing or expired keys return `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a scalar value, replacing whatever was there.
    /// `ttl: None` means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Atomically increment a counter and return the new value.
    ///
    /// Creating the counter (or recreating it after expiry) sets the TTL;
    /// increments on a live counter leave the TTL untouched. This is what
    /// makes velocity counters fixed-window.
    async fn incr(&self, key: &str, ttl: Option<Duration>) -> StoreResult<i64>;

    /// Read a counter without modifying it. Missing or expired keys read 0.
    async fn counter(&self, key: &str) -> StoreResult<i64>;

    /// Reset the TTL on a live key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Add a member to a set; returns true if the member was new.
    /// Refreshes the set's TTL on every call.
    async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>) -> StoreResult<bool>;

    /// Number of members in a set (0 for missing/expired keys).
    async fn set_card(&self, key: &str) -> StoreResult<u64>;

    /// Whether a member is in the set.
    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// All members of a set, in unspecified order.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Append to the tail of a list; returns the new length.
    /// Refreshes the list's TTL on every call.
    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<u64>;

    /// Trim a list to the inclusive range [start, stop]. Negative indices
    /// count from the tail (-1 is the last element), so `list_trim(k, -20, -1)`
    /// keeps the most recent 20 entries.
    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()>;

    /// Read the inclusive range [start, stop] of a list, with the same
    /// negative-index semantics as `list_trim`.
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;
}
