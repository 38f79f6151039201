//! Auth handlers and supporting modules.
//!
//! Accounts are email + password. Passwords are stored as salted PBKDF2
//! hashes; successful register/login returns an HS256 access/refresh pair.
//!
//! ## Token registry
//!
//! Every issued token is recorded (hashed) in `jwt_tokens`. Validation checks
//! the signature, the expiry, and then the registry; a token without a live,
//! unrevoked entry is rejected. Logout revokes the presented access token and,
//! if supplied, the refresh token. Refresh rotates: the old refresh token is
//! revoked before the new pair is issued.
//!
//! ## Rate limiting
//!
//! - **Register:** 3 requests per client per 5 minutes.
//! - **Login:** 5 requests per client per 5 minutes.
//! - **Everything else under `/api`:** 60 requests per client per minute.
//!
//! The client key is the socket peer. With `--trust-proxy` the first
//! `X-Forwarded-For` hop, then `X-Real-IP`, take precedence.

pub(crate) mod login;
pub mod password;
pub(crate) mod principal;
pub mod rate_limit;
pub(crate) mod register;
pub mod revocation;
pub(crate) mod session;
mod state;
pub mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use principal::Principal;
pub use rate_limit::{
    NoopRateLimiter, RateLimitAction, RateLimitRule, RateLimitRules, RateLimiter,
    SlidingWindowLimiter,
};
pub use state::{AuthConfig, AuthState};
pub use token::TokenManager;

use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use crate::api::error::ApiError;
use rate_limit::RateLimitDecision;

/// Count one request against `action` for `client`.
///
/// # Errors
/// Returns `ApiError::RateLimited` once the window is full.
pub(crate) fn enforce_rate_limit(
    auth_state: &AuthState,
    client: &str,
    action: RateLimitAction,
) -> Result<(), ApiError> {
    match auth_state.rate_limiter().check(client, action) {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Limited {
            max_requests,
            window_seconds,
        } => {
            warn!(
                target: "security",
                event = "rate_limited",
                client = %client,
                action = action.as_str()
            );
            Err(ApiError::RateLimited {
                max_requests,
                window_seconds,
            })
        }
    }
}

/// Middleware applying the default limit to the routes it wraps.
///
/// # Errors
/// Returns `ApiError::RateLimited` when the caller is over the default limit.
pub async fn default_rate_limit(
    auth_state: Extension<Arc<AuthState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = utils::client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        auth_state.config().trust_proxy(),
    );
    enforce_rate_limit(&auth_state, &client, RateLimitAction::Default)?;
    Ok(next.run(request).await)
}
