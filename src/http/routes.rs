//! Route table and handlers.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use super::middleware::rate_limit_middleware;
use crate::query::{AnalyticsQuery, QueryExecutor};
use crate::ratelimit::RateLimiter;

/// Body of the root route.
pub const GREETING: &str = "Welcome to EQ Works 😎";

/// Body of the `/error` placeholder route.
pub const PLACEHOLDER: &str = "Cannot Access This Right Now";

/// Body sent when a query fails. Never carries the underlying cause.
pub const FAILURE_BODY: &str = "Internal Server Error";

/// Shared handle to the query collaborator.
pub type SharedExecutor = Arc<dyn QueryExecutor>;

/// Build the full application router.
///
/// Every route, including unmatched paths, sits behind the rate limiter.
pub fn router(limiter: RateLimiter, executor: SharedExecutor) -> Router {
    let mut routes = Router::new()
        .route("/", get(greeting))
        .route("/error", get(placeholder));

    for query in AnalyticsQuery::ALL {
        routes = routes.route(
            query.path(),
            get(move |State(executor): State<SharedExecutor>| run_query(executor, query)),
        );
    }

    routes
        .with_state(executor)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn greeting() -> &'static str {
    GREETING
}

async fn placeholder() -> &'static str {
    PLACEHOLDER
}

/// Execute one analytics query and serialize its rows.
async fn run_query(executor: SharedExecutor, query: AnalyticsQuery) -> Response {
    match executor.fetch_rows(query.sql()).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            error!(query = %query, error = %e, "Query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, FAILURE_BODY).into_response()
        }
    }
}
