//! Rate limiting middleware applied ahead of every route.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::warn;

use crate::ratelimit::{ClientIdentity, RateLimiter};

/// Body sent with every rate limit rejection.
pub const REJECTION_BODY: &str = "Too many requests";

/// Check the client's counter before the request reaches any handler.
///
/// Rejected requests end here with `429`. Admitted and fail-open requests
/// continue unchanged. Requests without a peer address cannot be keyed and
/// are admitted.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| ClientIdentity::from_peer(addr));

    let Some(identity) = identity else {
        warn!(path = %request.uri().path(), "No client address on request, skipping rate limit");
        return next.run(request).await;
    };

    if limiter.check_limit(&identity).await.is_rejected() {
        return (StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY).into_response();
    }

    next.run(request).await
}
