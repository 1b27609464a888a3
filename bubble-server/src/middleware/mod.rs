//! HTTP middleware stack: bearer authentication, CORS and per-request tracing.

pub mod auth;
pub mod cors;
pub mod trace;
