use crate::{
    api::handlers::{health, root},
    store::DynStore,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
        HeaderName, HeaderValue, Method, Request, StatusCode,
    },
    response::IntoResponse,
    routing::{get, options},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
// Keep these internal to the crate while allowing CLI/server wiring to reference them.
pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use handlers::auth::{
    AuthConfig, AuthState, NoopRateLimiter, RateLimitAction, RateLimitRule, RateLimitRules,
    RateLimiter, SlidingWindowLimiter, TokenManager,
};
pub use openapi::openapi;

/// How often expired rows are dropped from the token registry.
const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How often idle rate-limit buckets are dropped.
const RATE_LIMIT_EVICT_INTERVAL: Duration = Duration::from_secs(60);

/// Origins allowed by default: the public storefronts plus local development.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://luanmercaldi.github.io",
    "https://3dbenchybros.com.br",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, `/`, the Swagger UI,
/// a JSON 404 fallback and the shared middleware stack.
///
/// # Errors
/// Returns an error if a CORS origin is not a valid header value.
pub fn app(store: DynStore, auth_state: Arc<AuthState>, cors_origins: &[String]) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_origin(allowed_origins(cors_origins)?);

    // Build the router from OpenAPI-wired routes, then extend it with non-doc routes like `/`,
    // the docs UI and preflight-only `OPTIONS /health`.
    let (router, openapi) = router().split_for_parts();
    let app = router
        .route("/", get(root::root))
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-xss-protection"),
                    HeaderValue::from_static("1; mode=block"),
                ))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(store)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    store: DynStore,
    auth_state: Arc<AuthState>,
    cors_origins: &[String],
) -> Result<()> {
    spawn_token_purge(store.clone());
    spawn_rate_limit_eviction(auth_state.clone());

    let app = app(store, auth_state, cors_origins)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn spawn_token_purge(store: DynStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired_tokens(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired tokens", purged),
                Err(err) => error!("Failed to purge expired tokens: {err:#}"),
            }
        }
    });
}

fn spawn_rate_limit_eviction(auth_state: Arc<AuthState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_EVICT_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = auth_state.rate_limiter().evict_stale();
            if evicted > 0 {
                debug!("Evicted {} idle rate-limit buckets", evicted);
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "endpoint not found" })),
    )
}

fn allowed_origins(origins: &[String]) -> Result<AllowOrigin> {
    // A wildcard cannot be mixed into an explicit list.
    if origins.iter().any(|origin| origin.trim() == "*") {
        return Ok(AllowOrigin::any());
    }

    let values = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(AllowOrigin::list(values))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_origins_parse() {
        let origins: Vec<String> = DEFAULT_CORS_ORIGINS.iter().map(ToString::to_string).collect();
        assert!(allowed_origins(&origins).is_ok());
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let origins = vec!["https://ok.example".to_string(), "bad\norigin".to_string()];
        assert!(allowed_origins(&origins).is_err());
    }

    #[test]
    fn wildcard_origin_is_accepted() {
        assert!(allowed_origins(&["*".to_string()]).is_ok());
    }
}
