//! The one external dependency the gateway core consumes: an opaque
//! key-value store with TTL, atomic increment, and a compare-and-swap
//! primitive. The health store and quota tracker are built entirely on top
//! of this trait; neither knows whether it's talking to an in-process map
//! or a networked backend.

mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryKVStore;

#[derive(Error, Debug, Clone)]
pub enum KvError {
    #[error("kvstore backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, KvError>;

/// Opaque key-value store contract. Implementations must be cheap to clone
/// (typically an `Arc` internally) and safe to share across tasks.
#[async_trait]
pub trait KVStore: Send + Sync {
    /// Fetch the current value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set `key` to `value`, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Atomically add `delta` to the integer stored at `key` (default 0 if
    /// absent), refresh its TTL if `ttl` is given, and return the new value.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64>;

    /// Set or refresh the TTL on an existing key. A no-op if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Whether `key` is present and not expired.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomic check-and-increment used by the quota tracker: if the current
    /// value (default 0) plus `delta` would exceed `limit`, the call is
    /// rejected (`Ok(None)`) without mutating anything. Otherwise the
    /// increment is applied, the TTL is (re)set to `ttl`, and the new value
    /// is returned. This must be a single round-trip at the backend — a
    /// naive read-then-write is not a valid implementation.
    async fn check_and_incr(
        &self,
        key: &str,
        delta: i64,
        limit: i64,
        ttl: Duration,
    ) -> Result<Option<i64>>;

    /// Compare-and-swap: if the current value of `key` equals `expected`
    /// (`None` meaning absent), replace it with `new` (optionally with a
    /// TTL) and return `true`. Otherwise leave the store untouched and
    /// return `false`. Used by the health store for state transitions that
    /// must not race each other.
    async fn cas(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Option<Duration>,
    ) -> Result<bool>;
}
