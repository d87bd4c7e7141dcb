//! Redis-backed counter store.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{ErrorKind, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::policy::LimitPolicy;
use super::store::{hit_sequentially, CounterStore, StoreError};

/// Increment, then arm the expiry only while the count is within the
/// threshold. Runs server-side so the three steps cannot interleave.
const HIT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count <= tonumber(ARGV[1]) then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return count
"#;

/// Redis implementation of [`CounterStore`].
///
/// The connection is opened on first use and dropped after a connection-level
/// failure, so the next request reconnects. Nothing is retried within a
/// request, and timeouts are the client library's defaults. The service can
/// therefore start while Redis is down; requests fail open until it returns.
pub struct RedisCounterStore {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    /// Use the server-side script for `hit` instead of three round-trips
    atomic: bool,
    script: Script,
}

impl RedisCounterStore {
    /// Create a store for the Redis server at `host:port`.
    ///
    /// No connection is attempted here; only the address is validated.
    pub fn new(host: &str, port: u16, atomic: bool) -> Result<Self, StoreError> {
        let url = format!("redis://{}:{}/", host, port);
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Connection(format!("invalid Redis address {url}: {e}")))?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            atomic,
            script: Script::new(HIT_SCRIPT),
        })
    }

    /// Check that Redis answers.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(())
    }

    /// Ping Redis from a background task, logging when it cannot be reached.
    ///
    /// Connecting has no timeout of its own, so a silent host would hold up
    /// the caller for as long as the operating system keeps trying.
    pub fn ping_in_background(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            match store.ping().await {
                Ok(()) => info!("Redis reachable for rate limiting"),
                Err(e) => warn!(error = %e, "Redis unreachable, requests will fail open"),
            }
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let cached = self.connection.lock().clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        debug!("Opening Redis connection for rate limiting");
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to connect to Redis");
                StoreError::Connection(e.to_string())
            })?;

        *self.connection.lock() = Some(conn.clone());
        Ok(conn)
    }

    /// Map a command error, forgetting the connection if it is broken.
    fn fail(&self, err: RedisError) -> StoreError {
        let mapped = map_redis_error(err);
        if matches!(mapped, StoreError::Connection(_)) {
            self.connection.lock().take();
        }
        mapped
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.connection().await?;
        let count: Option<u64> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let millis = ttl_millis(ttl)?;
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(())
    }

    async fn hit(&self, key: &str, policy: &LimitPolicy) -> Result<u64, StoreError> {
        if !self.atomic {
            return hit_sequentially(self, key, policy).await;
        }

        let millis = ttl_millis(policy.window())?;
        let mut conn = self.connection().await?;
        let count: u64 = self
            .script
            .key(key)
            .arg(policy.threshold())
            .arg(millis)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| self.fail(e))?;
        Ok(count)
    }
}

/// `PEXPIRE` accepts a signed 64-bit millisecond count.
fn ttl_millis(ttl: Duration) -> Result<i64, StoreError> {
    i64::try_from(ttl.as_millis())
        .map_err(|_| StoreError::Command(format!("expiry of {ttl:?} is out of range")))
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        StoreError::Connection(err.to_string())
    } else if err.kind() == ErrorKind::TypeError {
        StoreError::Malformed(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}
