use axum::response::{IntoResponse, Json};
use serde_json::json;

// axum handler for the API index
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "3DBenchy Bros API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "health": "/health",
            "products": "/api/products",
            "auth": "/api/auth",
            "cart": "/api/cart",
            "docs": "/docs",
        }
    }))
}
