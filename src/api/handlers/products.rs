//! Catalog endpoints. Reads are public; creating a product requires an admin.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::auth::Principal;
use crate::{
    api::error::ApiError,
    store::{
        seed::{is_known_category, Category, CATEGORIES},
        DynStore, NewProduct, Product,
    },
};

const MAX_PRODUCT_NAME_LEN: usize = 255;
const MIN_DESCRIPTION_LEN: usize = 10;

#[derive(Deserialize, IntoParams, Debug)]
pub struct ProductQuery {
    /// Restrict the listing to one category id.
    pub category: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: usize,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct CategoryList {
    pub categories: Vec<Category>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub is_featured: Option<bool>,
    pub stock_quantity: Option<i64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProductCreated {
    pub message: String,
    pub product: Product,
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "Active products", body = ProductList),
        (status = 429, description = "Rate limited")
    ),
    tag = "products"
)]
pub async fn list_products(
    store: Extension<DynStore>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductList>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty());
    let products = store.list_products(category).await?;
    Ok(Json(ProductList {
        total: products.len(),
        products,
    }))
}

#[utoipa::path(
    get,
    path = "/api/products/featured",
    responses(
        (status = 200, description = "Featured products", body = [Product])
    ),
    tag = "products"
)]
pub async fn featured_products(store: Extension<DynStore>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(store.featured_products().await?))
}

#[utoipa::path(
    get,
    path = "/api/products/categories",
    responses(
        (status = 200, description = "Product categories", body = CategoryList)
    ),
    tag = "products"
)]
pub async fn categories() -> Json<CategoryList> {
    Json(CategoryList {
        categories: CATEGORIES.to_vec(),
    })
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Unknown or inactive product")
    ),
    tag = "products"
)]
pub async fn get_product(
    store: Extension<DynStore>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    store
        .find_product(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("product not found"))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductCreated),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    principal: Principal,
    store: Extension<DynStore>,
    payload: Option<Json<CreateProductRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require_admin()?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };
    let product = validate_product(request).map_err(ApiError::Validation)?;

    let created = store.create_product(&product).await?;
    info!(
        "Product {} created by user {}",
        created.id, principal.user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(ProductCreated {
            message: "product created successfully".to_string(),
            product: created,
        }),
    ))
}

fn validate_product(request: CreateProductRequest) -> Result<NewProduct, String> {
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or("name is required")?;
    if name.chars().count() > MAX_PRODUCT_NAME_LEN {
        return Err(format!(
            "name must be at most {MAX_PRODUCT_NAME_LEN} characters"
        ));
    }

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|description| !description.is_empty())
        .ok_or("description is required")?;
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        return Err(format!(
            "description must be at least {MIN_DESCRIPTION_LEN} characters"
        ));
    }

    let price = request.price.ok_or("price is required")?;
    if !price.is_finite() || price <= 0.0 {
        return Err("price must be greater than zero".to_string());
    }

    let category = request
        .category
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .ok_or("category is required")?;
    if !is_known_category(category) {
        return Err(format!("unknown category: {category}"));
    }

    let stock_quantity = request.stock_quantity.unwrap_or(0);
    if stock_quantity < 0 {
        return Err("stock_quantity must not be negative".to_string());
    }

    Ok(NewProduct {
        name: name.to_string(),
        description: Some(description.to_string()),
        price,
        category: category.to_string(),
        image_url: request.image_url.filter(|url| !url.trim().is_empty()),
        is_featured: request.is_featured.unwrap_or(false),
        stock_quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateProductRequest {
        CreateProductRequest {
            name: Some("  3DBenchy  ".to_string()),
            description: Some("The classic calibration tugboat".to_string()),
            price: Some(15.99),
            category: Some("navais".to_string()),
            ..CreateProductRequest::default()
        }
    }

    #[test]
    fn valid_product_is_trimmed_and_defaulted() {
        let product = validate_product(request());
        assert!(product.is_ok());
        if let Ok(product) = product {
            assert_eq!(product.name, "3DBenchy");
            assert_eq!(product.stock_quantity, 0);
            assert!(!product.is_featured);
            assert_eq!(product.image_url, None);
        }
    }

    #[test]
    fn rejects_each_invalid_field() {
        let cases = [
            (
                CreateProductRequest {
                    name: None,
                    ..request()
                },
                "name is required",
            ),
            (
                CreateProductRequest {
                    description: Some("short".to_string()),
                    ..request()
                },
                "description must be at least 10 characters",
            ),
            (
                CreateProductRequest {
                    price: Some(0.0),
                    ..request()
                },
                "price must be greater than zero",
            ),
            (
                CreateProductRequest {
                    category: Some("categoria_inexistente".to_string()),
                    ..request()
                },
                "unknown category: categoria_inexistente",
            ),
            (
                CreateProductRequest {
                    stock_quantity: Some(-1),
                    ..request()
                },
                "stock_quantity must not be negative",
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(validate_product(input).err().as_deref(), Some(expected));
        }
    }
}
