//! Bulkhead core library
//!
//! This crate provides the concurrency and resilience layer that sits beneath
//! fleets of outbound calls to rate-limited, latency-variable remote services:
//! bounded workflow execution, token-bucket rate limiting, and pooled
//! connections with health checking and one-shot reconnect.

pub mod backoff;
pub mod error;
pub mod executor;
pub mod pool;
pub mod ratelimit;

// Re-export commonly used types
pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use error::{BulkheadError, BulkheadResult};
pub use executor::{
    ExecutorConfig, ProgressCallback, TaskOutcome, WorkflowExecutor, WorkflowResult,
    WorkflowSummary,
};
pub use pool::{
    ConnectionPool, ConnectionPoolConfig, ConnectionPoolStats, PoolResponse, RequestOptions,
};
pub use ratelimit::{ProviderRateLimiters, RateLimitConfig, RateLimiter};
