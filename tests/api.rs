use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use benchy::{
    api::{self, AuthConfig, AuthState, RateLimitRule, RateLimitRules, SlidingWindowLimiter, TokenManager},
    store::{self, DynStore},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tower::ServiceExt;

const SECRET: &str = "integration-test-signing-secret-0123456789";

struct TestApp {
    router: Router,
    store: DynStore,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    async fn new() -> Result<Self> {
        Self::with_limits(RateLimitRules::default()).await
    }

    async fn with_limits(rules: RateLimitRules) -> Result<Self> {
        Self::with_config(AuthConfig::new().with_rate_limits(rules)).await
    }

    async fn with_config(config: AuthConfig) -> Result<Self> {
        let store = store::connect("sqlite::memory:").await?;
        let limiter = Arc::new(SlidingWindowLimiter::new(config.rate_limits()));
        let tokens = TokenManager::new(&SecretString::from(SECRET));
        let auth_state = Arc::new(AuthState::new(config, tokens, limiter));
        let router = api::app(store.clone(), auth_state, &[])?;
        Ok(Self { router, store })
    }

    /// `client` is the socket peer the request appears to come from.
    async fn send(
        &self,
        method: Method,
        uri: &str,
        client: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Reply> {
        self.send_forwarded(method, uri, client, None, token, body)
            .await
    }

    async fn send_forwarded(
        &self,
        method: Method,
        uri: &str,
        client: &str,
        forwarded_for: Option<&str>,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Reply> {
        let peer = SocketAddr::new(client.parse::<IpAddr>()?, 40_000);
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .extension(ConnectInfo(peer));
        if let Some(forwarded_for) = forwarded_for {
            builder = builder.header("x-forwarded-for", forwarded_for);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };

        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    async fn register(&self, client: &str, name: &str, email: &str) -> Result<Reply> {
        self.send(
            Method::POST,
            "/api/auth/register",
            client,
            None,
            Some(json!({ "name": name, "email": email, "password": "Secret123" })),
        )
        .await
    }

    async fn login(&self, client: &str, email: &str, password: &str) -> Result<Reply> {
        self.send(
            Method::POST,
            "/api/auth/login",
            client,
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }
}

fn token(reply: &Reply, field: &str) -> Result<String> {
    reply.body["tokens"][field]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("missing tokens.{field} in {}", reply.body))
}

#[tokio::test]
async fn register_then_fetch_current_user() -> Result<()> {
    let app = TestApp::new().await?;

    let registered = app.register("10.0.0.1", "Ana", "ana@example.com").await?;
    assert_eq!(registered.status, StatusCode::CREATED);
    assert_eq!(registered.body["user"]["email"], "ana@example.com");
    assert_eq!(registered.body["tokens"]["token_type"], "Bearer");
    assert!(registered.body["user"].get("password_hash").is_none());
    let access = token(&registered, "access_token")?;

    let me = app
        .send(Method::GET, "/api/auth/user", "10.0.0.1", Some(&access), None)
        .await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["authenticated"], true);
    assert_eq!(me.body["user"]["email"], "ana@example.com");
    assert_eq!(me.body["user"]["name"], "Ana");

    let status = app
        .send(Method::GET, "/api/auth/status", "10.0.0.1", Some(&access), None)
        .await?;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["authenticated"], true);

    let anonymous = app
        .send(Method::GET, "/api/auth/status", "10.0.0.1", None, None)
        .await?;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body["authenticated"], false);
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts() -> Result<()> {
    let app = TestApp::new().await?;

    let first = app.register("10.0.1.1", "Ana", "ana@example.com").await?;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.register("10.0.1.2", "Ana Again", "ANA@Example.com").await?;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert!(second.body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn register_rejects_invalid_input() -> Result<()> {
    let app = TestApp::new().await?;

    let missing = app
        .send(
            Method::POST,
            "/api/auth/register",
            "10.0.2.1",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com" })),
        )
        .await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["error"], "password is required");

    let bad_email = app
        .send(
            Method::POST,
            "/api/auth/register",
            "10.0.2.2",
            None,
            Some(json!({ "name": "Ana", "email": "not-an-email", "password": "Secret123" })),
        )
        .await?;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let short_password = app
        .send(
            Method::POST,
            "/api/auth/register",
            "10.0.2.3",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "short" })),
        )
        .await?;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);

    let no_body = app
        .send(Method::POST, "/api/auth/register", "10.0.2.4", None, None)
        .await?;
    assert_eq!(no_body.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_body.body["error"], "Missing payload");
    Ok(())
}

#[tokio::test]
async fn login_failures_are_uniform() -> Result<()> {
    let app = TestApp::new().await?;
    app.register("10.0.3.1", "Ana", "ana@example.com").await?;

    let wrong_password = app.login("10.0.3.2", "ana@example.com", "Wrong1234").await?;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);

    let unknown = app.login("10.0.3.2", "nobody@example.com", "Secret123").await?;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown.body);

    let ok = app.login("10.0.3.2", " Ana@Example.com ", "Secret123").await?;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["user"]["email"], "ana@example.com");
    assert!(token(&ok, "access_token").is_ok());
    Ok(())
}

#[tokio::test]
async fn logout_revokes_access_and_refresh_tokens() -> Result<()> {
    let app = TestApp::new().await?;
    let registered = app.register("10.0.4.1", "Ana", "ana@example.com").await?;
    let access = token(&registered, "access_token")?;
    let refresh = token(&registered, "refresh_token")?;

    let logout = app
        .send(
            Method::POST,
            "/api/auth/logout",
            "10.0.4.1",
            Some(&access),
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(logout.status, StatusCode::OK);

    let reuse = app
        .send(Method::GET, "/api/auth/user", "10.0.4.1", Some(&access), None)
        .await?;
    assert_eq!(reuse.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reuse.body["error"], "invalid or expired token");

    let refreshed = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            "10.0.4.1",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(refreshed.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_the_pair() -> Result<()> {
    let app = TestApp::new().await?;
    let registered = app.register("10.0.5.1", "Ana", "ana@example.com").await?;
    let refresh = token(&registered, "refresh_token")?;

    let rotated = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            "10.0.5.1",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(rotated.status, StatusCode::OK);
    let new_access = token(&rotated, "access_token")?;

    let replay = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            "10.0.5.1",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await?;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let me = app
        .send(Method::GET, "/api/auth/user", "10.0.5.1", Some(&new_access), None)
        .await?;
    assert_eq!(me.status, StatusCode::OK);

    // An access token is not accepted as a refresh token.
    let wrong_kind = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            "10.0.5.1",
            None,
            Some(json!({ "refresh_token": new_access })),
        )
        .await?;
    assert_eq!(wrong_kind.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn garbage_bearer_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;

    let missing = app
        .send(Method::GET, "/api/cart", "10.0.6.1", None, None)
        .await?;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = app
        .send(Method::GET, "/api/cart", "10.0.6.1", Some("not.a.jwt"), None)
        .await?;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage.body["error"], "invalid or expired token");
    Ok(())
}

#[tokio::test]
async fn fourth_registration_is_rate_limited() -> Result<()> {
    let app = TestApp::new().await?;

    // Rejected registrations still count against the window.
    for _ in 0..3 {
        let reply = app
            .send(
                Method::POST,
                "/api/auth/register",
                "10.0.7.1",
                None,
                Some(json!({})),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let limited = app
        .send(
            Method::POST,
            "/api/auth/register",
            "10.0.7.1",
            None,
            Some(json!({})),
        )
        .await?;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["error"], "rate limit exceeded");
    assert_eq!(
        limited
            .headers
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok()),
        Some("300")
    );

    let other_client = app
        .send(
            Method::POST,
            "/api/auth/register",
            "10.0.7.2",
            None,
            Some(json!({})),
        )
        .await?;
    assert_eq!(other_client.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_login_limit() -> Result<()> {
    let app = TestApp::new().await?;

    for i in 0..5 {
        let reply = app
            .send_forwarded(
                Method::POST,
                "/api/auth/login",
                "10.0.7.10",
                Some(&format!("203.0.113.{i}")),
                None,
                Some(json!({})),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    }

    let limited = app
        .send_forwarded(
            Method::POST,
            "/api/auth/login",
            "10.0.7.10",
            Some("203.0.113.99"),
            None,
            Some(json!({})),
        )
        .await?;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn trusted_proxy_keys_on_forwarded_for() -> Result<()> {
    let app = TestApp::with_config(AuthConfig::new().with_trust_proxy(true)).await?;

    // One proxy peer fronting several clients.
    for i in 0..5 {
        let reply = app
            .send_forwarded(
                Method::POST,
                "/api/auth/login",
                "10.0.7.20",
                Some("203.0.113.1"),
                None,
                Some(json!({})),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "attempt {i}");
    }

    let limited = app
        .send_forwarded(
            Method::POST,
            "/api/auth/login",
            "10.0.7.20",
            Some("203.0.113.1"),
            None,
            Some(json!({})),
        )
        .await?;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

    let other_client = app
        .send_forwarded(
            Method::POST,
            "/api/auth/login",
            "10.0.7.20",
            Some("203.0.113.2"),
            None,
            Some(json!({})),
        )
        .await?;
    assert_eq!(other_client.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn default_limit_applies_to_api_routes() -> Result<()> {
    let rules = RateLimitRules {
        default: RateLimitRule::new(2, 60),
        ..RateLimitRules::default()
    };
    let app = TestApp::with_limits(rules).await?;

    for _ in 0..2 {
        let reply = app
            .send(Method::GET, "/api/products", "10.0.8.1", None, None)
            .await?;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let limited = app
        .send(Method::GET, "/api/products/categories", "10.0.8.1", None, None)
        .await?;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);

    // Health is outside the API limit.
    let health = app.send(Method::GET, "/health", "10.0.8.1", None, None).await?;
    assert_eq!(health.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn catalog_endpoints() -> Result<()> {
    let app = TestApp::new().await?;

    let all = app
        .send(Method::GET, "/api/products", "10.0.9.1", None, None)
        .await?;
    assert_eq!(all.status, StatusCode::OK);
    assert_eq!(all.body["total"], 6);

    let navais = app
        .send(Method::GET, "/api/products?category=navais", "10.0.9.1", None, None)
        .await?;
    assert_eq!(navais.status, StatusCode::OK);
    let products = navais.body["products"].as_array().cloned().unwrap_or_default();
    assert!(!products.is_empty());
    assert!(products.iter().all(|product| product["category"] == "navais"));

    let featured = app
        .send(Method::GET, "/api/products/featured", "10.0.9.1", None, None)
        .await?;
    assert_eq!(featured.status, StatusCode::OK);
    let featured = featured.body.as_array().cloned().unwrap_or_default();
    assert_eq!(featured.len(), 4);
    assert!(featured.iter().all(|product| product["is_featured"] == true));

    let categories = app
        .send(Method::GET, "/api/products/categories", "10.0.9.1", None, None)
        .await?;
    assert_eq!(
        categories.body["categories"].as_array().map(Vec::len),
        Some(store::seed::CATEGORIES.len())
    );

    let first_id = all.body["products"][0]["id"]
        .as_i64()
        .context("missing product id")?;
    let one = app
        .send(
            Method::GET,
            &format!("/api/products/{first_id}"),
            "10.0.9.1",
            None,
            None,
        )
        .await?;
    assert_eq!(one.status, StatusCode::OK);
    assert_eq!(one.body["id"], first_id);

    let missing = app
        .send(Method::GET, "/api/products/999999", "10.0.9.1", None, None)
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "product not found");
    Ok(())
}

#[tokio::test]
async fn creating_products_requires_admin() -> Result<()> {
    let app = TestApp::new().await?;
    let registered = app.register("10.0.10.1", "Bia", "bia@example.com").await?;
    let access = token(&registered, "access_token")?;
    let user_id = registered.body["user"]["id"]
        .as_i64()
        .context("missing user id")?;

    let product = json!({
        "name": "3DBenchy",
        "description": "The classic calibration tugboat",
        "price": 15.99,
        "category": "navais"
    });

    let anonymous = app
        .send(Method::POST, "/api/products", "10.0.10.1", None, Some(product.clone()))
        .await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forbidden = app
        .send(
            Method::POST,
            "/api/products",
            "10.0.10.1",
            Some(&access),
            Some(product.clone()),
        )
        .await?;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    assert!(app.store.set_admin(user_id, true).await?);
    let admin = app.login("10.0.10.1", "bia@example.com", "Secret123").await?;
    let admin_access = token(&admin, "access_token")?;

    let invalid = app
        .send(
            Method::POST,
            "/api/products",
            "10.0.10.1",
            Some(&admin_access),
            Some(json!({ "name": "Benchy", "description": "short", "price": 1.0, "category": "navais" })),
        )
        .await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let created = app
        .send(
            Method::POST,
            "/api/products",
            "10.0.10.1",
            Some(&admin_access),
            Some(product),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["product"]["name"], "3DBenchy");

    let all = app
        .send(Method::GET, "/api/products", "10.0.10.1", None, None)
        .await?;
    assert_eq!(all.body["total"], 7);
    Ok(())
}

#[tokio::test]
async fn cart_lifecycle() -> Result<()> {
    let app = TestApp::new().await?;
    let registered = app.register("10.0.11.1", "Caio", "caio@example.com").await?;
    let access = token(&registered, "access_token")?;
    let client = "10.0.11.1";

    let unknown = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": 999_999, "quantity": 1 })),
        )
        .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let zero = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": 1, "quantity": 0 })),
        )
        .await?;
    assert_eq!(zero.status, StatusCode::BAD_REQUEST);

    let count = app
        .send(Method::GET, "/api/cart/count", client, Some(&access), None)
        .await?;
    assert_eq!(count.body["total_items"], 0);

    let products = app
        .send(Method::GET, "/api/products", client, None, None)
        .await?;
    let product_id = products.body["products"][0]["id"]
        .as_i64()
        .context("missing product id")?;

    let added = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id, "quantity": 2 })),
        )
        .await?;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.body["cart_total_items"], 2);

    // Adding the same product again increments the existing line.
    let again = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id })),
        )
        .await?;
    assert_eq!(again.body["cart_total_items"], 3);

    let cart = app
        .send(Method::GET, "/api/cart", client, Some(&access), None)
        .await?;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["total_items"], 3);
    assert_eq!(cart.body["currency"], "BRL");
    let items = cart.body["items"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    let item_id = items[0]["id"].as_i64().context("missing item id")?;

    // Another user cannot touch this cart line.
    let other = app.register("10.0.11.2", "Duda", "duda@example.com").await?;
    let other_access = token(&other, "access_token")?;
    let foreign = app
        .send(
            Method::DELETE,
            &format!("/api/cart/{item_id}"),
            "10.0.11.2",
            Some(&other_access),
            None,
        )
        .await?;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let removed = app
        .send(
            Method::DELETE,
            &format!("/api/cart/{item_id}"),
            client,
            Some(&access),
            None,
        )
        .await?;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["cart_total_items"], 0);

    app.send(
        Method::POST,
        "/api/cart",
        client,
        Some(&access),
        Some(json!({ "product_id": product_id, "quantity": 5 })),
    )
    .await?;
    let cleared = app
        .send(Method::DELETE, "/api/cart/clear", client, Some(&access), None)
        .await?;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["cart_total_items"], 0);

    let count = app
        .send(Method::GET, "/api/cart/count", client, Some(&access), None)
        .await?;
    assert_eq!(count.body["total_items"], 0);
    Ok(())
}

#[tokio::test]
async fn cart_quantity_is_capped_per_line() -> Result<()> {
    let app = TestApp::new().await?;
    let registered = app.register("10.0.11.5", "Duda", "duda@example.com").await?;
    let access = token(&registered, "access_token")?;
    let client = "10.0.11.5";

    let products = app
        .send(Method::GET, "/api/products", client, None, None)
        .await?;
    let product_id = products.body["products"][0]["id"]
        .as_i64()
        .context("missing product id")?;

    let huge = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id, "quantity": i64::MAX })),
        )
        .await?;
    assert_eq!(huge.status, StatusCode::BAD_REQUEST);

    let first = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id, "quantity": 600 })),
        )
        .await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["cart_total_items"], 600);

    let over = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id, "quantity": 400 })),
        )
        .await?;
    assert_eq!(over.status, StatusCode::BAD_REQUEST);

    // The line is untouched and the cart still reads back.
    let cart = app
        .send(Method::GET, "/api/cart", client, Some(&access), None)
        .await?;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["total_items"], 600);

    let topped_up = app
        .send(
            Method::POST,
            "/api/cart",
            client,
            Some(&access),
            Some(json!({ "product_id": product_id, "quantity": 399 })),
        )
        .await?;
    assert_eq!(topped_up.status, StatusCode::OK);
    assert_eq!(topped_up.body["cart_total_items"], 999);
    Ok(())
}

#[tokio::test]
async fn health_and_security_headers() -> Result<()> {
    let app = TestApp::new().await?;

    let health = app.send(Method::GET, "/health", "10.0.12.1", None, None).await?;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");
    assert_eq!(health.body["database"], "ok");
    assert!(health.headers.contains_key("x-app"));
    assert!(health.headers.contains_key("x-request-id"));
    assert_eq!(
        health
            .headers
            .get("x-content-type-options")
            .and_then(|value| value.to_str().ok()),
        Some("nosniff")
    );
    assert_eq!(
        health
            .headers
            .get("x-frame-options")
            .and_then(|value| value.to_str().ok()),
        Some("DENY")
    );
    assert_eq!(
        health
            .headers
            .get("x-xss-protection")
            .and_then(|value| value.to_str().ok()),
        Some("1; mode=block")
    );

    let root = app.send(Method::GET, "/", "10.0.12.1", None, None).await?;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body["status"], "online");

    let unknown = app
        .send(Method::GET, "/api/nothing-here", "10.0.12.1", None, None)
        .await?;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"], "endpoint not found");
    assert_eq!(
        unknown
            .headers
            .get("x-frame-options")
            .and_then(|value| value.to_str().ok()),
        Some("DENY")
    );
    Ok(())
}
