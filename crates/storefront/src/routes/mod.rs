//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check (in main.rs)
//! GET  /health/ready                - Readiness check (in main.rs)
//!
//! # Catalog
//! GET  /products                    - Product listing (cached)
//! GET  /products/{id}               - Product detail (cached)
//! POST /products/{id}/favorite      - Toggle wishlist entry (auth)
//!
//! # Cart
//! GET  /cart                        - Cart contents
//! POST /cart/add                    - Add a line
//! POST /cart/update                 - Set a line quantity
//! POST /cart/remove                 - Remove a line
//! GET  /cart/count                  - Unit count badge
//!
//! # Checkout
//! GET  /checkout                    - Flow state (reconciles pending order first)
//! POST /checkout/measurements       - Step 1 submit
//! POST /checkout/delivery           - Step 2 submit
//! POST /checkout/provider           - Select payment provider
//! POST /checkout/reset              - Reset draft + clear pending order
//! POST /checkout/order              - Create (or reuse) the order
//! POST /checkout/order/capture      - Capture after provider approval
//! POST /checkout/order/cancel       - Provider-side cancel callback
//! GET  /orders/{id}/status          - Order status view
//!
//! # Consent
//! GET  /consent/preferences         - Current consent record
//! PUT  /consent/preferences         - Update consent record
//! POST /consent/revoke              - Revoke one category
//!
//! # Auth
//! POST /auth/register               - Create account
//! POST /auth/login                  - Login (merges carts)
//! POST /auth/logout                 - Logout
//! GET  /auth/verify                 - Consume email verification token
//! POST /auth/deactivate             - Soft-delete own account (auth)
//! POST /auth/restore                - Restore a soft-deleted account
//!
//! # Events
//! GET  /events                      - SSE stream of auth/consent events
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod consent;
pub mod events;
pub mod payments;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/{id}", get(catalog::show))
        .route("/{id}/favorite", post(catalog::toggle_favorite))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/measurements", post(checkout::submit_measurements))
        .route("/delivery", post(checkout::submit_delivery))
        .route("/provider", post(checkout::select_provider))
        .route("/reset", post(checkout::reset))
        .route("/order", post(payments::create_order))
        .route("/order/capture", post(payments::capture_order))
        .route("/order/cancel", post(payments::cancel_order))
}

/// Create the consent routes router.
pub fn consent_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/preferences",
            get(consent::show_preferences).put(consent::update_preferences),
        )
        .route("/revoke", post(consent::revoke_category))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/verify", get(auth::verify))
        .route("/deactivate", post(auth::deactivate))
        .route("/restore", post(auth::restore))
}

/// Create all routes for the storefront.
///
/// Auth endpoints sit behind the strict rate limiter, cart/checkout behind
/// the relaxed one.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", catalog_routes())
        .nest("/cart", cart_routes().layer(crate::middleware::api_rate_limiter()))
        .nest(
            "/checkout",
            checkout_routes().layer(crate::middleware::api_rate_limiter()),
        )
        .nest("/consent", consent_routes())
        .nest("/auth", auth_routes().layer(crate::middleware::auth_rate_limiter()))
        .route("/orders/{id}/status", get(payments::order_status))
        .route("/events", get(events::stream))
}
