//! Rate limit configuration

use crate::error::{BulkheadError, BulkheadResult};
use serde::{Deserialize, Serialize};

/// Per-provider rate limit policy
///
/// The sustained rate is expressed either as requests per minute or requests
/// per second; when both are set, requests per second takes precedence. The
/// burst size is the token bucket capacity and defaults to the computed
/// per-second rate, with a minimum of one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per minute
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Maximum requests per second (takes precedence over requests_per_minute)
    #[serde(default)]
    pub requests_per_second: Option<f64>,

    /// Maximum burst size (token bucket capacity)
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // Conservative fallback for unknown providers
        Self {
            requests_per_minute: Some(30),
            requests_per_second: None,
            burst_size: Some(5),
        }
    }
}

impl RateLimitConfig {
    /// Create a new configuration with requests per minute and burst size
    pub fn new(requests_per_minute: u32, burst_size: u32) -> Self {
        Self {
            requests_per_minute: Some(requests_per_minute),
            requests_per_second: None,
            burst_size: Some(burst_size),
        }
    }

    /// Create a configuration with requests per second
    pub fn per_second(requests_per_second: f64) -> Self {
        Self {
            requests_per_minute: None,
            requests_per_second: Some(requests_per_second),
            burst_size: None,
        }
    }

    /// Get configuration for a specific provider
    ///
    /// Provider names are matched case-insensitively. Unknown providers fall
    /// back to the conservative default.
    pub fn for_provider(provider: &str) -> Self {
        match provider.to_lowercase().as_str() {
            // Anthropic: 50 RPM for Claude models
            "anthropic" => Self::new(50, 5),
            // OpenAI: varies by tier, use conservative defaults
            "openai" => Self::new(60, 10),
            // Google: 60 RPM for Gemini
            "google" => Self::new(60, 10),
            // OpenRouter: aggregates multiple providers
            "openrouter" => Self::new(60, 10),
            // Ollama: local, can be more generous
            "ollama" => Self::new(120, 30),
            // Default for unknown providers
            _ => Self::default(),
        }
    }

    /// Set requests per minute
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Set requests per second
    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Set burst size
    pub fn with_burst_size(mut self, size: u32) -> Self {
        self.burst_size = Some(size);
        self
    }

    /// The sustained rate in tokens per second
    pub fn rate(&self) -> f64 {
        if let Some(rps) = self.requests_per_second {
            rps
        } else if let Some(rpm) = self.requests_per_minute {
            rpm as f64 / 60.0
        } else {
            0.0
        }
    }

    /// The effective bucket capacity: explicit burst size, or the per-second
    /// rate rounded up, never less than one
    pub fn effective_burst(&self) -> u32 {
        match self.burst_size {
            Some(burst) => burst,
            None => (self.rate().ceil() as u32).max(1),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> BulkheadResult<()> {
        let rate = self.rate();
        if !rate.is_finite() || rate <= 0.0 {
            return Err(BulkheadError::config(format!(
                "rate must be positive, got {} tokens/s",
                rate
            )));
        }
        if self.burst_size == Some(0) {
            return Err(BulkheadError::config("burst_size must be positive"));
        }
        Ok(())
    }
}
