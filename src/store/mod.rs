//! Storage backends for users, catalog, cart and the token registry.
//!
//! A single [`Store`] trait fronts both backends. The DSN scheme picks one at
//! startup: `postgres://` (or `postgresql://`) opens a [`PgStore`], `sqlite:`
//! opens a [`SqliteStore`]. Schema creation is idempotent and runs on every
//! connect; an empty catalog is seeded with the sample products.
//!
//! Uniqueness (user email, cart line per product, token hash) is enforced by
//! table constraints. Callers treat a constraint violation as the authoritative
//! conflict signal instead of checking first.

mod postgres;
pub mod seed;
mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;
use tracing::info;
use url::Url;
use utoipa::ToSchema;

pub type DynStore = Arc<dyn Store>;

/// Public view of a user; never carries credential material.
#[derive(ToSchema, FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User row plus the stored password material used by login.
#[derive(FromRow, Debug, Clone)]
pub struct CredentialRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub password_hash: Option<String>,
    pub salt: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub salt: &'a str,
}

#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    Conflict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Revocation registry entry for one issued token.
#[derive(FromRow, Debug, Clone)]
pub struct TokenRecord {
    pub user_id: i64,
    pub kind: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

#[derive(ToSchema, FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub is_active: bool,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub image_url: Option<String>,
    pub is_featured: bool,
    pub stock_quantity: i64,
}

/// A cart row joined with its product.
#[derive(ToSchema, FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartLine {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub quantity: i64,
    pub subtotal: f64,
}

/// Most units of one product a cart line may hold.
pub const MAX_CART_QUANTITY: i64 = 999;

#[derive(Debug, PartialEq, Eq)]
pub enum AddToCartOutcome {
    Added,
    UnknownProduct,
    /// The line would exceed [`MAX_CART_QUANTITY`]; nothing was changed.
    QuantityExceeded,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name used in logs and health output.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    /// Operator action with no HTTP surface.
    async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<bool>;

    async fn create_user(&self, user: NewUser<'_>) -> Result<CreateUserOutcome>;
    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<CredentialRecord>>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>>;

    async fn record_token(
        &self,
        user_id: i64,
        token_hash: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>>;
    /// Returns `true` when an unrevoked entry was flipped to revoked.
    async fn revoke_token(&self, token_hash: &str) -> Result<bool>;
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn count_products(&self) -> Result<i64>;
    async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>>;
    async fn featured_products(&self) -> Result<Vec<Product>>;
    async fn find_product(&self, id: i64) -> Result<Option<Product>>;
    async fn create_product(&self, product: &NewProduct) -> Result<Product>;

    async fn cart_items(&self, user_id: i64) -> Result<Vec<CartLine>>;
    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<AddToCartOutcome>;
    async fn remove_cart_item(&self, user_id: i64, item_id: i64) -> Result<bool>;
    async fn clear_cart(&self, user_id: i64) -> Result<u64>;
    async fn cart_count(&self, user_id: i64) -> Result<i64>;
}

/// Open the backend named by the DSN scheme, apply the schema and seed the catalog.
///
/// # Errors
/// Returns an error for unsupported schemes, connection failures, or schema errors.
pub async fn connect(dsn: &str) -> Result<DynStore> {
    let store: DynStore = match dsn_scheme(dsn) {
        Some("postgres" | "postgresql") => Arc::new(PgStore::connect(dsn).await?),
        Some("sqlite") => Arc::new(SqliteStore::connect(dsn).await?),
        Some(other) => return Err(anyhow!("Unsupported database scheme: {other}")),
        None => return Err(anyhow!("Invalid database DSN")),
    };

    let seeded = seed::seed_catalog(store.as_ref()).await?;
    if seeded > 0 {
        info!("Seeded {} sample products", seeded);
    }

    info!("Connected to {} store at {}", store.backend(), redact_dsn(dsn));

    Ok(store)
}

fn dsn_scheme(dsn: &str) -> Option<&str> {
    dsn.split_once(':')
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty())
}

/// Hide the password part of a DSN before it reaches the logs.
#[must_use]
pub fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("***")).is_err() {
                return String::from("***");
            }
            url.to_string()
        }
        _ => dsn.to_string(),
    }
}

/// Unique-constraint violations on either backend.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
