//! Core rate limiter implementation.

use std::sync::Arc;
use tracing::{info, warn};

use super::identity::ClientIdentity;
use super::policy::LimitPolicy;
use super::store::CounterStore;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The identity is within its limit
    Admit,
    /// The identity exceeded its limit for the current window
    Reject,
    /// The counter store could not be consulted; the request is let through
    FailOpen,
}

impl Decision {
    /// Whether the request must be turned away.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Decision::Reject)
    }
}

/// Fixed-window rate limiter over a shared counter store.
///
/// The limiter keeps no counts of its own; the store is the only source of
/// truth. Store failures never reject a request.
#[derive(Clone)]
pub struct RateLimiter {
    /// Shared counter store
    store: Arc<dyn CounterStore>,
    /// Threshold and window applied to every identity
    policy: LimitPolicy,
}

impl RateLimiter {
    /// Create a new rate limiter over `store`.
    pub fn new(store: Arc<dyn CounterStore>, policy: LimitPolicy) -> Self {
        Self { store, policy }
    }

    /// Get the policy this limiter enforces.
    pub fn policy(&self) -> &LimitPolicy {
        &self.policy
    }

    /// Check the rate limit for a client identity.
    ///
    /// Records the request in the store, then rejects it when the observed
    /// count is strictly greater than the threshold. While within the
    /// threshold the key's expiry is re-armed to the window length.
    pub async fn check_limit(&self, identity: &ClientIdentity) -> Decision {
        let count = match self.store.hit(identity.as_key(), &self.policy).await {
            Ok(count) => count,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Could not access rate limit counter");
                return Decision::FailOpen;
            }
        };

        info!(identity = %identity, count = count, "Incremented rate limit counter");

        if self.policy.is_exceeded(count) {
            info!(
                identity = %identity,
                count = count,
                threshold = self.policy.threshold(),
                "Rate limit exceeded"
            );
            return Decision::Reject;
        }

        Decision::Admit
    }
}
