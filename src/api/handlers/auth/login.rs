//! Password login.

use anyhow::Context;
use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

use super::{
    enforce_rate_limit,
    password::{verify_password, DECOY_HASH_HEX, DECOY_SALT_HEX},
    rate_limit::RateLimitAction,
    register::required,
    revocation,
    state::AuthState,
    types::{AuthResponse, LoginRequest},
    utils::{client_key, normalize_email},
};
use crate::{
    api::error::ApiError,
    store::{CredentialRecord, DynStore, UserRecord},
};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let client = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        auth_state.config().trust_proxy(),
    );
    enforce_rate_limit(&auth_state, &client, RateLimitAction::Login)?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let email = normalize_email(&required(request.email, "email")?);
    let password = required(request.password, "password")?;

    let record = store.find_credentials_by_email(&email).await?;

    // Unknown email, password-less account and wrong password all look the
    // same, and all pay for one key derivation.
    let Candidate { user, hash, salt } = Candidate::from_record(record);
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash, &salt))
        .await
        .context("password verification task failed")?;
    let verified = user.filter(|_| ok);

    let Some(user) = verified else {
        warn!(
            target: "security",
            event = "login_failed",
            client = %client
        );
        return Err(ApiError::InvalidCredentials);
    };

    let issued = auth_state
        .tokens()
        .issue(&user)
        .context("failed to issue tokens")?;
    revocation::register(store.as_ref(), user.id, &issued).await?;

    info!(
        target: "security",
        event = "login",
        client = %client,
        user_id = user.id
    );

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            message: "login successful".to_string(),
            user,
            tokens: issued.pair,
        }),
    ))
}

/// What a login attempt is checked against. `user` is `None` when the
/// material is the decoy, so a decoy match can never sign anyone in.
struct Candidate {
    user: Option<UserRecord>,
    hash: String,
    salt: String,
}

impl Candidate {
    fn from_record(record: Option<CredentialRecord>) -> Self {
        match record {
            Some(CredentialRecord {
                user,
                password_hash: Some(hash),
                salt: Some(salt),
            }) => Self {
                user: Some(user),
                hash,
                salt,
            },
            _ => Self {
                user: None,
                hash: DECOY_HASH_HEX.to_string(),
                salt: DECOY_SALT_HEX.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(password_hash: Option<&str>, salt: Option<&str>) -> CredentialRecord {
        CredentialRecord {
            user: UserRecord {
                id: 3,
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                is_admin: false,
                avatar_url: None,
                created_at: Utc::now(),
            },
            password_hash: password_hash.map(str::to_string),
            salt: salt.map(str::to_string),
        }
    }

    #[test]
    fn unknown_email_is_checked_against_decoy() {
        let candidate = Candidate::from_record(None);
        assert!(candidate.user.is_none());
        assert_eq!(candidate.hash, DECOY_HASH_HEX);
        assert_eq!(candidate.salt, DECOY_SALT_HEX);
    }

    #[test]
    fn passwordless_account_is_checked_against_decoy() {
        for stored in [
            record(None, None),
            record(Some("abcd"), None),
            record(None, Some("abcd")),
        ] {
            let candidate = Candidate::from_record(Some(stored));
            assert!(candidate.user.is_none());
            assert_eq!(candidate.hash, DECOY_HASH_HEX);
            assert_eq!(candidate.salt, DECOY_SALT_HEX);
        }
    }

    #[test]
    fn stored_material_is_used_when_present() {
        let candidate = Candidate::from_record(Some(record(Some("aa"), Some("bb"))));
        assert_eq!(candidate.user.map(|user| user.id), Some(3));
        assert_eq!(candidate.hash, "aa");
        assert_eq!(candidate.salt, "bb");
    }
}
