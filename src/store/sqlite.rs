use super::{
    is_unique_violation, AddToCartOutcome, CartLine, CreateUserOutcome, CredentialRecord,
    NewProduct, NewUser, Product, Store, TokenKind, TokenRecord, UserRecord, MAX_CART_QUANTITY,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Connection, SqlitePool,
};
use std::str::FromStr;
use tracing::{info_span, Instrument, Span};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/sqlite.sql"));

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image_url, is_featured, is_active, stock_quantity, created_at";

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "sqlite",
        db.operation = operation,
        db.statement = statement
    )
}

/// Embedded file-backed (or in-memory) store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database file, creating it if needed, and apply the schema.
    ///
    /// In-memory databases are pinned to a single connection that never
    /// expires, otherwise each new connection would see an empty database.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the file cannot be opened, or
    /// the schema fails to apply.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(dsn)
            .with_context(|| format!("Invalid sqlite DSN: {dsn}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = dsn.contains(":memory:") || dsn.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to open sqlite database")?;

        let store = Self { pool };
        store.apply_schema().await?;
        Ok(store)
    }

    /// Create the tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(query_span("DDL", "schema"))
            .await
            .context("failed to apply sqlite schema")?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")?;
        conn.ping()
            .instrument(info_span!("db.ping", db.system = "sqlite", db.operation = "PING"))
            .await
            .context("failed to ping database")
    }

    async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<bool> {
        let query = "UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?";
        let result = sqlx::query(query)
            .bind(is_admin)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update admin flag")?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_user(&self, user: NewUser<'_>) -> Result<CreateUserOutcome> {
        let query = r"
            INSERT INTO users (name, email, password_hash, salt, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, email, is_admin, avatar_url, created_at
        ";
        let now = Utc::now();
        let result = sqlx::query_as::<_, UserRecord>(query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.salt)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match result {
            Ok(record) => Ok(CreateUserOutcome::Created(record)),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_credentials_by_email(&self, email: &str) -> Result<Option<CredentialRecord>> {
        let query = "SELECT id, name, email, is_admin, avatar_url, created_at, password_hash, salt FROM users WHERE email = ?";
        sqlx::query_as::<_, CredentialRecord>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user credentials")
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let query =
            "SELECT id, name, email, is_admin, avatar_url, created_at FROM users WHERE id = ?";
        sqlx::query_as::<_, UserRecord>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user")
    }

    async fn record_token(
        &self,
        user_id: i64,
        token_hash: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = "INSERT INTO jwt_tokens (user_id, token_hash, kind, expires_at, created_at) VALUES (?, ?, ?, ?, ?)";
        sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(kind.as_str())
            .bind(expires_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to record token")?;
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<TokenRecord>> {
        let query =
            "SELECT user_id, kind, expires_at, is_revoked FROM jwt_tokens WHERE token_hash = ?";
        sqlx::query_as::<_, TokenRecord>(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup token")
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool> {
        let query = "UPDATE jwt_tokens SET is_revoked = 1 WHERE token_hash = ? AND is_revoked = 0";
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to revoke token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM jwt_tokens WHERE expires_at < ?";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to purge expired tokens")?;
        Ok(result.rows_affected())
    }

    async fn count_products(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) FROM products";
        sqlx::query_scalar::<_, i64>(query)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to count products")
    }

    async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND (? IS NULL OR category = ?) ORDER BY id"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(category)
            .bind(category)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list products")
    }

    async fn featured_products(&self) -> Result<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 AND is_featured = 1 ORDER BY id"
        );
        sqlx::query_as::<_, Product>(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list featured products")
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let query =
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND is_active = 1");
        sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup product")
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let query = format!(
            r"
            INSERT INTO products
                (name, description, price, category, image_url, is_featured, stock_quantity, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let now = Utc::now();
        sqlx::query_as::<_, Product>(&query)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.category)
            .bind(&product.image_url)
            .bind(product.is_featured)
            .bind(product.stock_quantity)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("failed to insert product")
    }

    async fn cart_items(&self, user_id: i64) -> Result<Vec<CartLine>> {
        let query = r"
            SELECT c.id, c.product_id, p.name, p.price, p.image_url, c.quantity,
                   p.price * c.quantity AS subtotal
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = ?
            ORDER BY c.id
        ";
        sqlx::query_as::<_, CartLine>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to load cart")
    }

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<AddToCartOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin add to cart transaction")?;

        let query = "SELECT id FROM products WHERE id = ? AND is_active = 1";
        let exists = sqlx::query_scalar::<_, i64>(query)
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup product")?;
        if exists.is_none() {
            return Ok(AddToCartOutcome::UnknownProduct);
        }

        let query = r"
            INSERT INTO cart_items (user_id, product_id, quantity, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + excluded.quantity,
                          updated_at = excluded.updated_at
            WHERE cart_items.quantity + excluded.quantity <= ?
        ";
        let now = Utc::now();
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .bind(now)
            .bind(now)
            .bind(MAX_CART_QUANTITY)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to upsert cart item")?;
        if result.rows_affected() == 0 {
            return Ok(AddToCartOutcome::QuantityExceeded);
        }

        tx.commit().await.context("commit add to cart")?;
        Ok(AddToCartOutcome::Added)
    }

    async fn remove_cart_item(&self, user_id: i64, item_id: i64) -> Result<bool> {
        let query = "DELETE FROM cart_items WHERE id = ? AND user_id = ?";
        let result = sqlx::query(query)
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to remove cart item")?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: i64) -> Result<u64> {
        let query = "DELETE FROM cart_items WHERE user_id = ?";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to clear cart")?;
        Ok(result.rows_affected())
    }

    async fn cart_count(&self, user_id: i64) -> Result<i64> {
        let query = "SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE user_id = ?";
        sqlx::query_scalar::<_, i64>(query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to count cart items")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed::SAMPLE_PRODUCTS;

    async fn memory_store() -> Result<SqliteStore> {
        SqliteStore::connect("sqlite::memory:").await
    }

    fn new_user<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            name: "Ana",
            email,
            password_hash: "00",
            salt: "11",
        }
    }

    #[tokio::test]
    async fn create_user_conflicts_on_duplicate_email() -> Result<()> {
        let store = memory_store().await?;

        let first = store.create_user(new_user("ana@example.com")).await?;
        let CreateUserOutcome::Created(user) = first else {
            anyhow::bail!("expected first insert to succeed");
        };
        assert_eq!(user.email, "ana@example.com");
        assert!(!user.is_admin);

        let second = store.create_user(new_user("ana@example.com")).await?;
        assert!(matches!(second, CreateUserOutcome::Conflict));

        let stored = store
            .find_credentials_by_email("ana@example.com")
            .await?
            .map(|record| record.user);
        assert_eq!(stored, Some(user));
        Ok(())
    }

    #[tokio::test]
    async fn token_registry_revokes_once() -> Result<()> {
        let store = memory_store().await?;
        let CreateUserOutcome::Created(user) = store.create_user(new_user("t@example.com")).await?
        else {
            anyhow::bail!("expected user");
        };

        let expires_at = Utc::now() + chrono::Duration::hours(1);
        store
            .record_token(user.id, "abc", TokenKind::Access, expires_at)
            .await?;

        let record = store.find_token("abc").await?;
        assert!(record.as_ref().is_some_and(|r| !r.is_revoked));
        assert_eq!(record.map(|r| r.kind), Some("access".to_string()));

        assert!(store.revoke_token("abc").await?);
        assert!(!store.revoke_token("abc").await?);
        assert!(store.find_token("abc").await?.is_some_and(|r| r.is_revoked));
        assert!(!store.revoke_token("missing").await?);
        Ok(())
    }

    #[tokio::test]
    async fn purge_drops_only_expired_tokens() -> Result<()> {
        let store = memory_store().await?;
        let CreateUserOutcome::Created(user) = store.create_user(new_user("p@example.com")).await?
        else {
            anyhow::bail!("expected user");
        };

        let now = Utc::now();
        store
            .record_token(user.id, "old", TokenKind::Access, now - chrono::Duration::minutes(5))
            .await?;
        store
            .record_token(user.id, "new", TokenKind::Refresh, now + chrono::Duration::days(1))
            .await?;

        assert_eq!(store.purge_expired_tokens(now).await?, 1);
        assert!(store.find_token("old").await?.is_none());
        assert!(store.find_token("new").await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn connect_seeds_catalog_once() -> Result<()> {
        let store = crate::store::connect("sqlite::memory:").await?;
        assert_eq!(
            store.count_products().await?,
            i64::try_from(SAMPLE_PRODUCTS.len())?
        );

        let aeronaves = store.list_products(Some("aeronaves")).await?;
        assert_eq!(aeronaves.len(), 2);
        assert!(aeronaves.iter().all(|p| p.category == "aeronaves"));

        let featured = store.featured_products().await?;
        assert_eq!(featured.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn cart_upsert_accumulates_quantity() -> Result<()> {
        let store = memory_store().await?;
        let CreateUserOutcome::Created(user) = store.create_user(new_user("c@example.com")).await?
        else {
            anyhow::bail!("expected user");
        };
        let product = store
            .create_product(&NewProduct {
                name: "Benchy".to_string(),
                description: Some("Classic calibration boat".to_string()),
                price: 15.5,
                category: "navais".to_string(),
                image_url: None,
                is_featured: false,
                stock_quantity: 3,
            })
            .await?;

        assert_eq!(
            store.add_to_cart(user.id, product.id, 2).await?,
            AddToCartOutcome::Added
        );
        assert_eq!(
            store.add_to_cart(user.id, product.id, 1).await?,
            AddToCartOutcome::Added
        );
        assert_eq!(
            store.add_to_cart(user.id, 9_999, 1).await?,
            AddToCartOutcome::UnknownProduct
        );
        assert_eq!(
            store
                .add_to_cart(user.id, product.id, MAX_CART_QUANTITY - 2)
                .await?,
            AddToCartOutcome::QuantityExceeded
        );

        let items = store.cart_items(user.id).await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert!((items[0].subtotal - 46.5).abs() < f64::EPSILON);
        assert_eq!(store.cart_count(user.id).await?, 3);

        assert!(!store.remove_cart_item(user.id + 1, items[0].id).await?);
        assert!(store.remove_cart_item(user.id, items[0].id).await?);
        assert_eq!(store.cart_count(user.id).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn set_admin_flips_flag() -> Result<()> {
        let store = memory_store().await?;
        let CreateUserOutcome::Created(user) = store.create_user(new_user("a@example.com")).await?
        else {
            anyhow::bail!("expected user");
        };
        assert!(store.set_admin(user.id, true).await?);
        let reloaded = store.find_user_by_id(user.id).await?;
        assert!(reloaded.is_some_and(|u| u.is_admin));
        Ok(())
    }
}
