//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use atelier_core::ProductId;

use crate::commerce::Product;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::payments::BackendError;
use crate::state::AppState;

/// Product listing.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state.commerce().get_products().await?;
    Ok(Json(products.as_ref().clone()))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let product_id =
        ProductId::new(id).ok_or_else(|| AppError::BadRequest("empty product id".to_string()))?;

    match state.commerce().get_product(&product_id).await {
        Ok(product) => Ok(Json(product)),
        Err(BackendError::NotFound(_)) => {
            Err(AppError::NotFound(format!("product {product_id}")))
        }
        Err(e) => Err(e.into()),
    }
}

/// Response of `POST /products/{id}/favorite`.
#[derive(Debug, Serialize)]
pub struct FavoriteView {
    pub favorited: bool,
}

/// Toggle a wishlist entry for the logged-in buyer.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<FavoriteView>> {
    let product_id =
        ProductId::new(id).ok_or_else(|| AppError::BadRequest("empty product id".to_string()))?;

    let favorited = state
        .commerce()
        .toggle_favorite(user.id, &product_id)
        .await?;

    Ok(Json(FavoriteView { favorited }))
}
