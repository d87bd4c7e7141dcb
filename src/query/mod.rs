//! Read-only analytics queries and their execution.

mod executor;
mod templates;

pub use executor::{PgQueryExecutor, QueryError, QueryExecutor, Row};
pub use templates::AnalyticsQuery;
