//! Sliding-window rate limiting for auth and API routes.
//!
//! Each `(action, client key)` pair owns a queue of request instants. A
//! request is admitted when fewer than `max_requests` instants fall inside the
//! trailing window; admitted requests append their instant, rejected ones do
//! not.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
    Default,
}

impl RateLimitAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Default => "default",
        }
    }
}

/// `max_requests` per `window_seconds`, parsed from `"N/W"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl RateLimitRule {
    #[must_use]
    pub const fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    fn window(self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_requests, self.window_seconds)
    }
}

impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (max, window) = value
            .split_once('/')
            .ok_or_else(|| format!("expected MAX/WINDOW_SECONDS, got '{value}'"))?;
        let max_requests: u32 = max
            .trim()
            .parse()
            .map_err(|_| format!("invalid request count '{max}'"))?;
        let window_seconds: u64 = window
            .trim()
            .parse()
            .map_err(|_| format!("invalid window '{window}'"))?;
        if max_requests == 0 || window_seconds == 0 {
            return Err("request count and window must be greater than zero".to_string());
        }
        Ok(Self::new(max_requests, window_seconds))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited {
        max_requests: u32,
        window_seconds: u64,
    },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str, action: RateLimitAction) -> RateLimitDecision;

    /// Drop idle buckets. Limiters without state have nothing to do.
    fn evict_stale(&self) -> usize {
        0
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitRules {
    pub register: RateLimitRule,
    pub login: RateLimitRule,
    pub default: RateLimitRule,
}

impl Default for RateLimitRules {
    fn default() -> Self {
        Self {
            register: RateLimitRule::new(3, 300),
            login: RateLimitRule::new(5, 300),
            default: RateLimitRule::new(60, 60),
        }
    }
}

impl RateLimitRules {
    #[must_use]
    pub const fn rule(&self, action: RateLimitAction) -> RateLimitRule {
        match action {
            RateLimitAction::Register => self.register,
            RateLimitAction::Login => self.login,
            RateLimitAction::Default => self.default,
        }
    }
}

type Buckets = HashMap<(RateLimitAction, String), VecDeque<Instant>>;

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    rules: RateLimitRules,
    buckets: Mutex<Buckets>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(rules: RateLimitRules) -> Self {
        Self {
            rules,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn rules(&self) -> RateLimitRules {
        self.rules
    }

    // A panic while holding the lock leaves the map consistent; keep serving.
    fn lock(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check_at(&self, key: &str, action: RateLimitAction, now: Instant) -> RateLimitDecision {
        let rule = self.rules.rule(action);
        let mut buckets = self.lock();
        let queue = buckets.entry((action, key.to_string())).or_default();

        while let Some(oldest) = queue.front() {
            if now.saturating_duration_since(*oldest) >= rule.window() {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() >= rule.max_requests as usize {
            return RateLimitDecision::Limited {
                max_requests: rule.max_requests,
                window_seconds: rule.window_seconds,
            };
        }

        queue.push_back(now);
        RateLimitDecision::Allowed
    }

    /// Remove buckets with no instant inside their window. Returns how many went.
    pub fn evict_stale_at(&self, now: Instant) -> usize {
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|(action, _), queue| {
            let window = self.rules.rule(*action).window();
            queue
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
        before - buckets.len()
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str, action: RateLimitAction) -> RateLimitDecision {
        self.check_at(key, action, Instant::now())
    }

    fn evict_stale(&self) -> usize {
        self.evict_stale_at(Instant::now())
    }
}
