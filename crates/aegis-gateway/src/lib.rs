//! Gateway Policy Engine (C11, §4.11): per-route authentication,
//! authorization, rate limiting, circuit breaking, response caching, and
//! request forwarding with metrics. A pure policy/decision library — the
//! REST wire surface in §6 ("Gateway wire surface") is an external HTTP
//! framework's responsibility, not this crate's; the teacher itself
//! carries no web framework dependency, and this crate follows suit.

pub mod auth;
pub mod authz;
pub mod cache;
pub mod circuit_breaker;
pub mod downstream;
pub mod engine;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod registry;

pub use engine::{Credential, GatewayEngine, IncomingRequest};
pub use error::{GatewayError, Result};
