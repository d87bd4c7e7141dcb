//! Rate limiting logic and counter store backends.

mod identity;
mod limiter;
mod memory;
mod policy;
mod redis;
mod store;

pub use identity::ClientIdentity;
pub use limiter::{Decision, RateLimiter};
pub use memory::InMemoryCounterStore;
pub use policy::LimitPolicy;
pub use redis::RedisCounterStore;
pub use store::{hit_sequentially, CounterStore, StoreError};
