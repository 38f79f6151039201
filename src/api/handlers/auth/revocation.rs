//! Per-token revocation registry backed by the `jwt_tokens` table.
//!
//! Tokens are recorded at issuance under the SHA-256 of their raw value. A
//! token is only trusted while its entry exists, is unrevoked and has not
//! passed its recorded expiry; a missing or stale entry fails closed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::token::{AccessClaims, IssuedTokens, RefreshClaims, TokenError, TokenManager};
use crate::store::{Store, TokenKind};

/// Hex SHA-256 of a raw token; the registry never sees the token itself.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Record both halves of a freshly issued pair.
///
/// # Errors
/// Returns an error if the store rejects either insert.
pub async fn register(store: &dyn Store, user_id: i64, issued: &IssuedTokens) -> Result<()> {
    store
        .record_token(
            user_id,
            &hash_token(&issued.pair.access_token),
            TokenKind::Access,
            issued.access_expires_at,
        )
        .await?;
    store
        .record_token(
            user_id,
            &hash_token(&issued.pair.refresh_token),
            TokenKind::Refresh,
            issued.refresh_expires_at,
        )
        .await
}

/// Registry half of validation.
///
/// # Errors
/// `Ok(Err(Revoked))` when the entry is missing, revoked, expired or belongs
/// to another user; the outer error is a storage failure.
pub async fn check(
    store: &dyn Store,
    token: &str,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Result<(), TokenError>> {
    let Some(record) = store.find_token(&hash_token(token)).await? else {
        return Ok(Err(TokenError::Revoked));
    };

    if record.is_revoked || record.expires_at <= now || record.user_id != user_id {
        return Ok(Err(TokenError::Revoked));
    }

    Ok(Ok(()))
}

/// Mark a token revoked. Returns `false` if it was unknown or already revoked.
///
/// # Errors
/// Returns an error on storage failure.
pub async fn revoke(store: &dyn Store, token: &str) -> Result<bool> {
    store.revoke_token(&hash_token(token)).await
}

/// Full access-token validation: signature, expiry, then the registry.
///
/// # Errors
/// The outer error is a storage failure; the inner one is the uniform
/// rejection.
pub async fn validate_access(
    store: &dyn Store,
    tokens: &TokenManager,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Result<AccessClaims, TokenError>> {
    let claims = match tokens.decode_access_at(token, now) {
        Ok(claims) => claims,
        Err(err) => return Ok(Err(err)),
    };
    Ok(check(store, token, claims.user_id, now).await?.map(|()| claims))
}

/// Full refresh-token validation: signature, expiry, then the registry.
///
/// # Errors
/// The outer error is a storage failure; the inner one is the uniform
/// rejection.
pub async fn validate_refresh(
    store: &dyn Store,
    tokens: &TokenManager,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Result<RefreshClaims, TokenError>> {
    let claims = match tokens.decode_refresh_at(token, now) {
        Ok(claims) => claims,
        Err(err) => return Ok(Err(err)),
    };
    Ok(check(store, token, claims.user_id, now).await?.map(|()| claims))
}
