use super::{
    is_unique_violation, AddToCartOutcome, CartLine, CreateUserOutcome, CredentialRecord,
    NewProduct, NewUser, Product, Store, TokenKind, TokenRecord, UserRecord, MAX_CART_QUANTITY,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Connection, PgPool};
use std::time::Duration;
use tracing::{info_span, Instrument, Span};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/postgres.sql"));

const PRODUCT_COLUMNS: &str = "id, name, description, price, category, image_url, is_featured, is_active, stock_quantity, created_at";

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the pool cannot connect or the schema fails to apply.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

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
            .context("failed to apply postgres schema")?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire connection")?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }

    async fn set_admin(&self, user_id: i64, is_admin: bool) -> Result<bool> {
        let query = "UPDATE users SET is_admin = $1, updated_at = $2 WHERE id = $3";
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
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, name, email, is_admin, avatar_url, created_at
        ";
        let result = sqlx::query_as::<_, UserRecord>(query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.salt)
            .bind(Utc::now())
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
        let query = "SELECT id, name, email, is_admin, avatar_url, created_at, password_hash, salt FROM users WHERE email = $1";
        sqlx::query_as::<_, CredentialRecord>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup user credentials")
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let query =
            "SELECT id, name, email, is_admin, avatar_url, created_at FROM users WHERE id = $1";
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
        let query = "INSERT INTO jwt_tokens (user_id, token_hash, kind, expires_at, created_at) VALUES ($1, $2, $3, $4, $5)";
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
            "SELECT user_id, kind, expires_at, is_revoked FROM jwt_tokens WHERE token_hash = $1";
        sqlx::query_as::<_, TokenRecord>(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup token")
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool> {
        let query =
            "UPDATE jwt_tokens SET is_revoked = TRUE WHERE token_hash = $1 AND is_revoked = FALSE";
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to revoke token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM jwt_tokens WHERE expires_at < $1";
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
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active AND ($1::TEXT IS NULL OR category = $1) ORDER BY id"
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(category)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list products")
    }

    async fn featured_products(&self) -> Result<Vec<Product>> {
        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active AND is_featured ORDER BY id"
        );
        sqlx::query_as::<_, Product>(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list featured products")
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active");
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Product>(&query)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.category)
            .bind(&product.image_url)
            .bind(product.is_featured)
            .bind(product.stock_quantity)
            .bind(Utc::now())
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
            WHERE c.user_id = $1
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

        let query = "SELECT id FROM products WHERE id = $1 AND is_active";
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
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity,
                          updated_at = EXCLUDED.updated_at
            WHERE cart_items.quantity + EXCLUDED.quantity <= $5
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .bind(Utc::now())
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
        let query = "DELETE FROM cart_items WHERE id = $1 AND user_id = $2";
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
        let query = "DELETE FROM cart_items WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to clear cart")?;
        Ok(result.rows_affected())
    }

    async fn cart_count(&self, user_id: i64) -> Result<i64> {
        let query = "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM cart_items WHERE user_id = $1";
        sqlx::query_scalar::<_, i64>(query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to count cart items")
    }
}
