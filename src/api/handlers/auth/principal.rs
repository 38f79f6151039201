//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the bearer token, verify signature and expiry, confirm
//! the registry still holds it unrevoked, then hand the claims to the handler.
//! Any failure short-circuits with the uniform 401 before the handler runs.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};
use tracing::warn;

use super::{
    revocation,
    state::AuthState,
    utils::{client_key, extract_bearer_token},
};
use crate::{api::error::ApiError, store::DynStore};

/// Identity attached to a request that carried a valid access token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
    /// Raw bearer token, kept so logout can revoke exactly this token.
    pub token: String,
}

impl Principal {
    /// # Errors
    /// Returns `ApiError::Forbidden` for non-admin callers.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("auth state extension missing"))?;
        let store = parts
            .extensions
            .get::<DynStore>()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("store extension missing"))?;

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let Some(token) = extract_bearer_token(&parts.headers) else {
            warn!(
                target: "security",
                event = "token_rejected",
                client = %client_key(&parts.headers, peer, auth_state.config().trust_proxy()),
                reason = "missing bearer token"
            );
            return Err(ApiError::Unauthorized);
        };

        match revocation::validate_access(store.as_ref(), auth_state.tokens(), &token, Utc::now())
            .await?
        {
            Ok(claims) => Ok(Self {
                user_id: claims.user_id,
                email: claims.email,
                is_admin: claims.is_admin,
                token,
            }),
            Err(err) => {
                warn!(
                    target: "security",
                    event = "token_rejected",
                    client = %client_key(&parts.headers, peer, auth_state.config().trust_proxy()),
                    reason = %err
                );
                Err(ApiError::Unauthorized)
            }
        }
    }
}
