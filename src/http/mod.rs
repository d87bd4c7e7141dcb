//! HTTP surface: routes, rate limiting middleware and the server.

mod middleware;
mod routes;
mod server;

pub use middleware::{rate_limit_middleware, REJECTION_BODY};
pub use routes::{router, SharedExecutor, FAILURE_BODY, GREETING, PLACEHOLDER};
pub use server::HttpServer;
