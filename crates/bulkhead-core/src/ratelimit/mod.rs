//! Rate limiting for outbound API calls
//!
//! This module provides token bucket rate limiting to control request rates
//! against upstream providers and avoid tripping their rate limits. A single
//! [`RateLimiter`] gates one named upstream; [`ProviderRateLimiters`] keeps a
//! lazily-created, name-keyed registry of limiters with per-provider defaults.

mod config;
mod limiter;
mod registry;


pub use config::RateLimitConfig;
pub use limiter::RateLimiter;
pub use registry::ProviderRateLimiters;
