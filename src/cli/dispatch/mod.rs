//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action. The signing secret is resolved
//! here so a misconfigured production server stops before it touches the
//! database.

use crate::cli::actions::{
    server::{self, Args},
    Action,
};
use crate::cli::commands::{auth, limits, ARG_CORS_ORIGINS, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the signing secret
/// is unacceptable for the environment.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let rate_limits = limits::parse(matches)?;
    let trust_proxy = limits::trust_proxy(matches);

    let cors_origins = matches
        .get_many::<String>(ARG_CORS_ORIGINS)
        .map(|values| {
            values
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let jwt_secret = server::resolve_jwt_secret(auth_opts.environment, auth_opts.jwt_secret)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        environment: auth_opts.environment,
        jwt_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        rate_limits,
        trust_proxy,
        cors_origins,
    }))
}
