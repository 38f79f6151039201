//! Per-user shopping cart. Every route requires a valid access token and only
//! ever touches the caller's own rows.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::auth::Principal;
use crate::{
    api::error::ApiError,
    store::{AddToCartOutcome, CartLine, DynStore, MAX_CART_QUANTITY},
};

const CURRENCY: &str = "BRL";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_items: i64,
    /// Rounded to two decimal places.
    pub total_price: f64,
    pub currency: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct AddToCartRequest {
    pub product_id: Option<i64>,
    /// Defaults to 1.
    pub quantity: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CartUpdated {
    pub message: String,
    pub cart_total_items: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CartCount {
    pub total_items: i64,
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart contents", body = CartView),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    principal: Principal,
    store: Extension<DynStore>,
) -> Result<Json<CartView>, ApiError> {
    let items = store.cart_items(principal.user_id).await?;
    Ok(Json(cart_view(items)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Product added", body = CartUpdated),
        (status = 400, description = "Missing product, bad quantity or line over the per-product cap"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown product")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    principal: Principal,
    store: Extension<DynStore>,
    payload: Option<Json<AddToCartRequest>>,
) -> Result<Json<CartUpdated>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };
    let product_id = request
        .product_id
        .ok_or_else(|| ApiError::Validation("product_id is required".to_string()))?;
    let quantity = request.quantity.unwrap_or(1);
    if quantity <= 0 {
        return Err(ApiError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(ApiError::Validation(format!(
            "quantity must be at most {MAX_CART_QUANTITY}"
        )));
    }

    match store
        .add_to_cart(principal.user_id, product_id, quantity)
        .await?
    {
        AddToCartOutcome::Added => {}
        AddToCartOutcome::UnknownProduct => return Err(ApiError::NotFound("product not found")),
        AddToCartOutcome::QuantityExceeded => {
            return Err(ApiError::Validation(format!(
                "cart cannot hold more than {MAX_CART_QUANTITY} units of one product"
            )))
        }
    }

    Ok(Json(CartUpdated {
        message: "product added to cart".to_string(),
        cart_total_items: store.cart_count(principal.user_id).await?,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{item_id}",
    params(("item_id" = i64, Path, description = "Cart line id")),
    responses(
        (status = 200, description = "Item removed", body = CartUpdated),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No such item in the caller's cart")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn remove_item(
    principal: Principal,
    store: Extension<DynStore>,
    Path(item_id): Path<i64>,
) -> Result<Json<CartUpdated>, ApiError> {
    if !store.remove_cart_item(principal.user_id, item_id).await? {
        return Err(ApiError::NotFound("cart item not found"));
    }

    Ok(Json(CartUpdated {
        message: "item removed from cart".to_string(),
        cart_total_items: store.cart_count(principal.user_id).await?,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/cart/clear",
    responses(
        (status = 200, description = "Cart emptied", body = CartUpdated),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    principal: Principal,
    store: Extension<DynStore>,
) -> Result<Json<CartUpdated>, ApiError> {
    store.clear_cart(principal.user_id).await?;
    Ok(Json(CartUpdated {
        message: "cart cleared".to_string(),
        cart_total_items: 0,
    }))
}

#[utoipa::path(
    get,
    path = "/api/cart/count",
    responses(
        (status = 200, description = "Number of units in the cart", body = CartCount),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "cart"
)]
pub async fn cart_count(
    principal: Principal,
    store: Extension<DynStore>,
) -> Result<Json<CartCount>, ApiError> {
    Ok(Json(CartCount {
        total_items: store.cart_count(principal.user_id).await?,
    }))
}

fn cart_view(items: Vec<CartLine>) -> CartView {
    let total_items = items.iter().map(|item| item.quantity).sum();
    let total_price: f64 = items.iter().map(|item| item.subtotal).sum();
    CartView {
        items,
        total_items,
        total_price: (total_price * 100.0).round() / 100.0,
        currency: CURRENCY.to_string(),
    }
}
