use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::api::{RateLimitRule, RateLimitRules};

pub const ARG_REGISTER_RATE_LIMIT: &str = "register-rate-limit";
pub const ARG_LOGIN_RATE_LIMIT: &str = "login-rate-limit";
pub const ARG_DEFAULT_RATE_LIMIT: &str = "default-rate-limit";
pub const ARG_TRUST_PROXY: &str = "trust-proxy";

fn rule_parser(value: &str) -> std::result::Result<RateLimitRule, String> {
    value.parse()
}

/// # Errors
/// Returns an error if a defaulted limit is missing.
pub fn parse(matches: &ArgMatches) -> Result<RateLimitRules> {
    let rule = |id: &str| {
        matches
            .get_one::<RateLimitRule>(id)
            .copied()
            .with_context(|| format!("missing required argument: --{id}"))
    };

    Ok(RateLimitRules {
        register: rule(ARG_REGISTER_RATE_LIMIT)?,
        login: rule(ARG_LOGIN_RATE_LIMIT)?,
        default: rule(ARG_DEFAULT_RATE_LIMIT)?,
    })
}

/// Whether `X-Forwarded-For` / `X-Real-IP` may name the client.
#[must_use]
pub fn trust_proxy(matches: &ArgMatches) -> bool {
    matches.get_flag(ARG_TRUST_PROXY)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REGISTER_RATE_LIMIT)
                .long(ARG_REGISTER_RATE_LIMIT)
                .help("Registrations allowed per client, as max/window_seconds")
                .env("BENCHY_REGISTER_RATE_LIMIT")
                .default_value("3/300")
                .value_parser(rule_parser),
        )
        .arg(
            Arg::new(ARG_LOGIN_RATE_LIMIT)
                .long(ARG_LOGIN_RATE_LIMIT)
                .help("Login attempts allowed per client, as max/window_seconds")
                .env("BENCHY_LOGIN_RATE_LIMIT")
                .default_value("5/300")
                .value_parser(rule_parser),
        )
        .arg(
            Arg::new(ARG_DEFAULT_RATE_LIMIT)
                .long(ARG_DEFAULT_RATE_LIMIT)
                .help("Requests allowed per client on other API routes, as max/window_seconds")
                .env("BENCHY_DEFAULT_RATE_LIMIT")
                .default_value("60/60")
                .value_parser(rule_parser),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY)
                .long(ARG_TRUST_PROXY)
                .help("Key rate limits on X-Forwarded-For / X-Real-IP instead of the socket peer")
                .long_help(
                    "Key rate limits on X-Forwarded-For / X-Real-IP instead of the socket peer. Only enable this behind a reverse proxy that overwrites those headers.",
                )
                .env("BENCHY_TRUST_PROXY")
                .action(ArgAction::SetTrue),
        )
}
