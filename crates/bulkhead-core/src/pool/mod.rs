//! Pooled HTTP connections with health checking and one-shot reconnect
//!
//! [`ConnectionPool`] wraps one pooled [`reqwest::Client`], tracks usage
//! statistics, runs a detached periodic health check, and transparently
//! reconnects once when a request fails to establish a connection. Callers
//! compose it with the rate limiter: acquire a token, then issue the call
//! through the pool.

mod client;
mod config;
mod stats;
mod types;


pub use client::ConnectionPool;
pub use config::ConnectionPoolConfig;
pub use stats::ConnectionPoolStats;
pub use types::{PoolResponse, RequestOptions};
