//! # Benchy (3D model storefront API)
//!
//! `benchy` serves the 3DBenchy Bros catalog, per-user carts, and the account
//! endpoints that guard them.
//!
//! ## Authentication
//!
//! Accounts are email + password, stored as salted PBKDF2-HMAC-SHA256 hashes.
//! Register and login return a short-lived access token and a long-lived
//! refresh token, both HS256 JWTs signed with a secret supplied at startup.
//! Each issued token is recorded by hash, so logout and refresh rotation can
//! revoke it before it expires.
//!
//! ## Storage
//!
//! The DSN scheme picks the backend: `sqlite://` for an embedded database or
//! `postgres://` for a server. The schema is applied on startup and an empty
//! catalog is seeded with sample products.
//!
//! ## Abuse protection
//!
//! Register, login and the remaining `/api` routes sit behind per-client
//! sliding-window rate limits. Security events go to the `security` tracing
//! target.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
