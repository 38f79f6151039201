//! Auth state and configuration.

use std::sync::Arc;

use super::{
    rate_limit::{RateLimitRules, RateLimiter},
    token::{TokenManager, DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS},
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    rate_limits: RateLimitRules,
    trust_proxy: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            rate_limits: RateLimitRules::default(),
            trust_proxy: false,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limits(mut self, rules: RateLimitRules) -> Self {
        self.rate_limits = rules;
        self
    }

    /// Honour `X-Forwarded-For` / `X-Real-IP` when keying rate limits.
    /// Leave off unless a reverse proxy overwrites those headers.
    #[must_use]
    pub fn with_trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn rate_limits(&self) -> RateLimitRules {
        self.rate_limits
    }

    #[must_use]
    pub fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }
}

pub struct AuthState {
    config: AuthConfig,
    tokens: TokenManager,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    /// The token manager's lifetimes are taken from `config`.
    pub fn new(config: AuthConfig, tokens: TokenManager, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let tokens = tokens
            .with_access_ttl_seconds(config.access_ttl_seconds())
            .with_refresh_ttl_seconds(config.refresh_ttl_seconds());
        Self {
            config,
            tokens,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
