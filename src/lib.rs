//! Ratewall - rate-limited analytics API
//!
//! This crate serves a handful of read-only analytics endpoints backed by
//! Postgres. Every request first passes a fixed-window rate limiter whose
//! counters live in an external store (Redis), and which admits requests
//! when that store cannot be reached.

pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod ratelimit;
pub mod telemetry;
