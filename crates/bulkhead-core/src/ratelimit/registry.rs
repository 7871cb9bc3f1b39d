//! Per-provider rate limiter registry

use super::config::RateLimitConfig;
use super::limiter::RateLimiter;
use crate::error::BulkheadResult;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Name-keyed registry of per-provider rate limiters
///
/// Limiters are created lazily on first acquire from an explicit override if
/// one was set, else a named default for that provider, else a conservative
/// fallback, and cached for the lifetime of the registry. Provider names are
/// matched case-insensitively.
///
/// The registry is an explicitly constructed value: build one at process
/// startup and pass it by reference to every caller that issues upstream
/// requests.
#[derive(Debug, Default)]
pub struct ProviderRateLimiters {
    limiters: DashMap<String, Arc<RateLimiter>>,
    overrides: DashMap<String, RateLimitConfig>,
}

impl ProviderRateLimiters {
    /// Create an empty registry seeded only with the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with explicit per-provider overrides
    pub fn with_limits<I>(limits: I) -> BulkheadResult<Self>
    where
        I: IntoIterator<Item = (String, RateLimitConfig)>,
    {
        let registry = Self::new();
        for (provider, config) in limits {
            registry.set_limit(&provider, config)?;
        }
        Ok(registry)
    }

    /// Store an override for a provider
    ///
    /// Any already-constructed limiter for that provider is dropped so the
    /// next acquire rebuilds it with the new policy.
    pub fn set_limit(&self, provider: &str, config: RateLimitConfig) -> BulkheadResult<()> {
        config.validate()?;
        let key = provider.to_lowercase();
        self.overrides.insert(key.clone(), config);
        self.limiters.remove(&key);
        debug!("rate limit override set for provider '{}'", key);
        Ok(())
    }

    /// Get or create the limiter for a provider
    pub fn limiter(&self, provider: &str) -> BulkheadResult<Arc<RateLimiter>> {
        let key = provider.to_lowercase();

        if let Some(limiter) = self.limiters.get(&key) {
            return Ok(limiter.clone());
        }

        let config = self
            .overrides
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| RateLimitConfig::for_provider(&key));
        let limiter = Arc::new(RateLimiter::new(config)?);

        // Under a race the first insert wins and the losing build is dropped
        Ok(self
            .limiters
            .entry(key)
            .or_insert(limiter)
            .value()
            .clone())
    }

    /// Acquire tokens for a provider, suspending while its bucket refills
    ///
    /// Returns false when the timeout budget would be exceeded, mirroring the
    /// single-limiter contract.
    pub async fn acquire(&self, provider: &str, tokens: u32, timeout: Option<Duration>) -> bool {
        match self.limiter(provider) {
            Ok(limiter) => limiter.acquire(tokens, timeout).await,
            Err(err) => {
                error!("rate limiter for provider '{}' unavailable: {}", provider, err);
                false
            }
        }
    }

    /// Blocking-thread variant of [`ProviderRateLimiters::acquire`]
    pub fn acquire_blocking(&self, provider: &str, tokens: u32, timeout: Option<Duration>) -> bool {
        match self.limiter(provider) {
            Ok(limiter) => limiter.acquire_blocking(tokens, timeout),
            Err(err) => {
                error!("rate limiter for provider '{}' unavailable: {}", provider, err);
                false
            }
        }
    }

    /// Reset one provider's bucket to full burst, or every cached bucket when
    /// no provider is given
    pub fn reset(&self, provider: Option<&str>) {
        match provider {
            Some(provider) => {
                if let Some(limiter) = self.limiters.get(&provider.to_lowercase()) {
                    limiter.reset();
                }
            }
            None => {
                for entry in self.limiters.iter() {
                    entry.value().reset();
                }
            }
        }
    }
}
