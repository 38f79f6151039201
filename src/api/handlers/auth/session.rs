//! Bearer session endpoints: current user, status, logout and refresh.

use anyhow::Context;
use axum::{
    extract::{ConnectInfo, Extension},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

use super::{
    principal::Principal,
    revocation,
    state::AuthState,
    types::{
        AuthStatusResponse, LogoutRequest, MessageResponse, RefreshRequest, RefreshResponse,
        UserResponse,
    },
    utils::{client_key, extract_bearer_token},
};
use crate::{api::error::ApiError, store::DynStore};

#[utoipa::path(
    get,
    path = "/api/auth/user",
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn user(
    principal: Principal,
    store: Extension<DynStore>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = store
        .find_user_by_id(principal.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(UserResponse {
        authenticated: true,
        user,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/status",
    responses(
        (status = 200, description = "Authentication status", body = AuthStatusResponse)
    ),
    tag = "auth"
)]
pub async fn status(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<AuthStatusResponse>, ApiError> {
    let anonymous = || {
        Json(AuthStatusResponse {
            authenticated: false,
            user: None,
            message: Some("not authenticated".to_string()),
        })
    };

    let Some(token) = extract_bearer_token(&headers) else {
        return Ok(anonymous());
    };

    let claims =
        match revocation::validate_access(store.as_ref(), auth_state.tokens(), &token, Utc::now())
            .await?
        {
            Ok(claims) => claims,
            Err(_) => return Ok(anonymous()),
        };

    Ok(match store.find_user_by_id(claims.user_id).await? {
        Some(user) => Json(AuthStatusResponse {
            authenticated: true,
            user: Some(user),
            message: None,
        }),
        None => anonymous(),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body(content = LogoutRequest, description = "Optional refresh token to revoke as well"),
    responses(
        (status = 200, description = "Tokens revoked", body = MessageResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    principal: Principal,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    revocation::revoke(store.as_ref(), &principal.token).await?;

    // Only a refresh token belonging to the same user is revoked.
    if let Some(refresh_token) = payload.and_then(|Json(body)| body.refresh_token) {
        let owned = auth_state
            .tokens()
            .decode_refresh_at(&refresh_token, Utc::now())
            .is_ok_and(|claims| claims.user_id == principal.user_id);
        if owned {
            revocation::revoke(store.as_ref(), &refresh_token).await?;
        }
    }

    info!(
        target: "security",
        event = "logout",
        client = %client_key(
            &headers,
            peer.map(|ConnectInfo(addr)| addr),
            auth_state.config().trust_proxy()
        ),
        user_id = principal.user_id
    );

    Ok(Json(MessageResponse {
        message: "logout successful".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = RefreshResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let client = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        auth_state.config().trust_proxy(),
    );
    let reject = |reason: &str| {
        warn!(
            target: "security",
            event = "token_rejected",
            client = %client,
            reason = reason
        );
        ApiError::Unauthorized
    };

    let Some(Json(request)) = payload else {
        return Err(reject("missing refresh token"));
    };

    let claims = match revocation::validate_refresh(
        store.as_ref(),
        auth_state.tokens(),
        &request.refresh_token,
        Utc::now(),
    )
    .await?
    {
        Ok(claims) => claims,
        Err(err) => return Err(reject(&err.to_string())),
    };

    // Losing this race means another request already rotated the token.
    if !revocation::revoke(store.as_ref(), &request.refresh_token).await? {
        return Err(reject("refresh token already used"));
    }

    let Some(user) = store.find_user_by_id(claims.user_id).await? else {
        return Err(reject("user no longer exists"));
    };

    let issued = auth_state
        .tokens()
        .issue(&user)
        .context("failed to issue tokens")?;
    revocation::register(store.as_ref(), user.id, &issued).await?;

    info!(
        target: "security",
        event = "token_refreshed",
        client = %client,
        user_id = user.id
    );

    Ok(Json(RefreshResponse {
        tokens: issued.pair,
    }))
}
