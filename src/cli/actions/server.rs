use crate::{
    api::{self, AuthConfig, AuthState, RateLimitRules, SlidingWindowLimiter, TokenManager},
    cli::{commands::auth::Environment, telemetry},
    store,
};
use anyhow::{anyhow, Context, Result};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shortest signing secret accepted in production, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const EPHEMERAL_SECRET_LEN: usize = 64;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub rate_limits: RateLimitRules,
    pub trust_proxy: bool,
    pub cors_origins: Vec<String>,
}

/// Decide which signing secret the server runs with.
///
/// Production requires a configured secret of at least [`MIN_SECRET_LEN`]
/// bytes. Development falls back to a random secret, so tokens do not survive
/// a restart.
///
/// # Errors
/// Returns an error in production when the secret is missing or too short.
pub fn resolve_jwt_secret(
    environment: Environment,
    configured: Option<SecretString>,
) -> Result<SecretString> {
    let configured = configured.filter(|secret| !secret.expose_secret().trim().is_empty());

    match (environment, configured) {
        (Environment::Production, None) => Err(anyhow!(
            "missing required argument: --jwt-secret (BENCHY_JWT_SECRET) in production"
        )),
        (Environment::Production, Some(secret))
            if secret.expose_secret().len() < MIN_SECRET_LEN =>
        {
            Err(anyhow!(
                "--jwt-secret must be at least {MIN_SECRET_LEN} bytes in production"
            ))
        }
        (Environment::Development, Some(secret))
            if secret.expose_secret().len() < MIN_SECRET_LEN =>
        {
            warn!("JWT secret is shorter than {MIN_SECRET_LEN} bytes; production would refuse it");
            Ok(secret)
        }
        (_, Some(secret)) => Ok(secret),
        (Environment::Development, None) => {
            warn!("No JWT secret configured; using an ephemeral secret, tokens will not survive a restart");
            Ok(ephemeral_secret())
        }
    }
}

fn ephemeral_secret() -> SecretString {
    let mut bytes = [0u8; EPHEMERAL_SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    SecretString::from(hex::encode(bytes))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        environment = ?args.environment,
        dsn = %store::redact_dsn(&args.dsn),
        "Starting server"
    );

    let store = store::connect(&args.dsn)
        .await
        .context("Failed to open database")?;

    let auth_config = AuthConfig::new()
        .with_access_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_rate_limits(args.rate_limits)
        .with_trust_proxy(args.trust_proxy);

    let rate_limiter = Arc::new(SlidingWindowLimiter::new(auth_config.rate_limits()));
    let auth_state = Arc::new(AuthState::new(
        auth_config,
        TokenManager::new(&args.jwt_secret),
        rate_limiter,
    ));

    let result = api::new(args.port, store, auth_state, &args.cors_origins).await;

    telemetry::shutdown_tracer();

    result
}
