//! API handlers for the storefront.
//!
//! `auth` owns accounts, tokens and rate limiting; `products` and `cart` are
//! thin collaborators over the store.

pub mod auth;
pub mod cart;
pub mod health;
pub mod products;
pub mod root;
