//! Counter store trait for abstracting Redis and in-memory implementations.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::policy::LimitPolicy;

/// Errors raised by a counter store.
///
/// The limiter never surfaces these to clients; any of them makes the
/// request fail open.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The store rejected or failed a command
    #[error("command failed: {0}")]
    Command(String),

    /// The store answered with something that is not a counter
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Trait for counter store implementations.
///
/// Counters are created implicitly at 1 by `increment` and carry no expiry
/// until `expire` arms one. Once the expiry elapses the key is absent again.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `key`, returning the new value.
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;

    /// Read the counter for `key`, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Arm (or re-arm) the time-to-live of `key`.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Record one request for `key` and return the observed count.
    ///
    /// Increments, reads the value back, and re-arms the expiry when the
    /// count is still within the threshold.
    async fn hit(&self, key: &str, policy: &LimitPolicy) -> Result<u64, StoreError> {
        hit_sequentially(self, key, policy).await
    }
}

/// The increment, read, conditional-expire sequence over a store's primitives.
///
/// The three steps are not atomic as a group: a concurrent request for the
/// same key may land between them and be observed by this read.
pub async fn hit_sequentially<S>(store: &S, key: &str, policy: &LimitPolicy) -> Result<u64, StoreError>
where
    S: CounterStore + ?Sized,
{
    store.increment(key).await?;

    let count = store
        .get(key)
        .await?
        .ok_or_else(|| StoreError::Malformed(format!("counter {key} vanished after increment")))?;

    if !policy.is_exceeded(count) {
        store.expire(key, policy.window()).await?;
    }

    Ok(count)
}
