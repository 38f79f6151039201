//! HS256 access and refresh tokens.
//!
//! Issuance and structural validation only. Revocation lives in the registry
//! (see `revocation.rs`), which every issued token is recorded in.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::{TokenKind, UserRecord};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
/// One year; longer lifetimes are clamped.
pub const MAX_ACCESS_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
/// Ten years; longer lifetimes are clamped.
pub const MAX_REFRESH_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Every rejection collapses to one of these; callers map all of them to the
/// same unauthorized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed or has a bad signature")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("token has been revoked")]
    Revoked,
    #[error("token could not be signed")]
    Signing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: String,
}

/// Identity only; never carries the admin flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: String,
}

trait Claims {
    fn exp(&self) -> i64;
    fn typ(&self) -> &str;
}

impl Claims for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }

    fn typ(&self) -> &str {
        &self.typ
    }
}

impl Claims for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }

    fn typ(&self) -> &str {
        &self.typ
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

/// A freshly minted pair plus the expiries the registry needs.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("encoding_key", &"***")
            .field("decoding_key", &"***")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

impl TokenManager {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked after the signature against an explicit clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds.clamp(1, MAX_ACCESS_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds.clamp(1, MAX_REFRESH_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    /// Mint an access/refresh pair for `user`.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue(&self, user: &UserRecord) -> Result<IssuedTokens, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Same as [`TokenManager::issue`] with an explicit clock.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_at(&self, user: &UserRecord, now: DateTime<Utc>) -> Result<IssuedTokens, TokenError> {
        let access_expires_at = now + Duration::seconds(self.access_ttl_seconds);
        let refresh_expires_at = now + Duration::seconds(self.refresh_ttl_seconds);

        let access = AccessClaims {
            user_id: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin,
            exp: access_expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TokenKind::Access.as_str().to_string(),
        };
        let refresh = RefreshClaims {
            user_id: user.id,
            exp: refresh_expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: TokenKind::Refresh.as_str().to_string(),
        };

        let header = Header::new(Algorithm::HS256);
        let access_token =
            encode(&header, &access, &self.encoding_key).map_err(|_| TokenError::Signing)?;
        let refresh_token =
            encode(&header, &refresh, &self.encoding_key).map_err(|_| TokenError::Signing)?;

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token,
                refresh_token,
                token_type: "Bearer".to_string(),
                expires_in: self.access_ttl_seconds,
            },
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verify signature, then expiry, then that the token is an access token.
    ///
    /// # Errors
    /// `Invalid` for format, signature or kind failures; `Expired` past `exp`.
    pub fn decode_access_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        self.decode_at(token, now, TokenKind::Access)
    }

    /// Verify signature, then expiry, then that the token is a refresh token.
    ///
    /// # Errors
    /// `Invalid` for format, signature or kind failures; `Expired` past `exp`.
    pub fn decode_refresh_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        self.decode_at(token, now, TokenKind::Refresh)
    }

    fn decode_at<C>(&self, token: &str, now: DateTime<Utc>, kind: TokenKind) -> Result<C, TokenError>
    where
        C: Claims + DeserializeOwned,
    {
        let data = decode::<C>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?;
        let claims = data.claims;

        if claims.exp() <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.typ() != kind.as_str() {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }
}
