//! Account registration.

use anyhow::Context;
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

use super::{
    enforce_rate_limit,
    password::hash_password,
    rate_limit::RateLimitAction,
    revocation,
    state::AuthState,
    types::{AuthResponse, RegisterRequest},
    utils::{client_key, normalize_email, valid_email, validate_name, validate_password},
};
use crate::{
    api::error::ApiError,
    store::{CreateUserOutcome, DynStore, NewUser},
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let client = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        auth_state.config().trust_proxy(),
    );
    enforce_rate_limit(&auth_state, &client, RateLimitAction::Register)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let name = required(request.name, "name")?;
    let email = required(request.email, "email")?;
    let password = required(request.password, "password")?;

    let name = validate_name(&name).map_err(ApiError::Validation)?;
    let email = normalize_email(&email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("invalid email format".to_string()));
    }
    validate_password(&password).map_err(ApiError::Validation)?;

    // 100k PBKDF2 rounds; keep them off the async workers.
    let stored = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")??;

    let outcome = store
        .create_user(NewUser {
            name: &name,
            email: &email,
            password_hash: &stored.hash_hex,
            salt: &stored.salt_hex,
        })
        .await?;

    let user = match outcome {
        CreateUserOutcome::Created(user) => user,
        CreateUserOutcome::Conflict => return Err(ApiError::Conflict),
    };

    let issued = auth_state
        .tokens()
        .issue(&user)
        .context("failed to issue tokens")?;
    revocation::register(store.as_ref(), user.id, &issued).await?;

    info!(
        target: "security",
        event = "signup",
        client = %client,
        user_id = user.id
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "user registered successfully".to_string(),
            user,
            tokens: issued.pair,
        }),
    ))
}

/// Present and non-blank, or a `"<field> is required"` validation error.
pub(super) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::Validation(format!("{field} is required"))),
    }
}
