//! Metric helpers for `framerpc`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without an
//! installed recorder every call is a no-op.

use metrics::{counter, gauge};

/// Name of the gauge tracking open server connections.
pub const CONNECTIONS_ACTIVE: &str = "framerpc_connections_active";
/// Name of the counter tracking invoked methods.
pub const REQUESTS_TOTAL: &str = "framerpc_requests_total";
/// Name of the counter tracking failed requests, labelled by kind.
pub const ERRORS_TOTAL: &str = "framerpc_errors_total";
/// Name of the counter tracking requests rejected by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "framerpc_rate_limited_total";
/// Name of the counter tracking panicking connection tasks.
pub const CONNECTION_PANICS: &str = "framerpc_connection_panics_total";

/// Increment the active connections gauge.
pub fn inc_connections() { gauge!(CONNECTIONS_ACTIVE).increment(1.0); }

/// Decrement the active connections gauge.
pub fn dec_connections() { gauge!(CONNECTIONS_ACTIVE).decrement(1.0); }

/// Record a method invocation.
pub fn inc_requests() { counter!(REQUESTS_TOTAL).increment(1); }

/// Record a failed request of the given kind.
pub fn inc_errors(kind: &'static str) { counter!(ERRORS_TOTAL, "kind" => kind).increment(1); }

/// Record a request rejected by the rate limiter.
pub fn inc_rate_limited() { counter!(RATE_LIMITED_TOTAL).increment(1); }

/// Record a connection task that panicked.
pub fn inc_connection_panics() { counter!(CONNECTION_PANICS).increment(1); }
