//! Cart route handlers.
//!
//! The session owns the working cart; for logged-in buyers every mutation
//! is pushed to the backend copy best-effort so another device eventually
//! sees it.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{CartItem, ProductId};

use crate::cart::{self, Cart};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Cart display data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            subtotal: cart.subtotal().display(),
            item_count: cart.count(),
        }
    }
}

/// Current cart contents.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = cart::load(&session).await;
    Ok(Json(CartView::from(&cart)))
}

/// Body of `POST /cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddBody {
    #[serde(flatten)]
    pub item: CartItem,
}

/// Add a line to the cart.
#[instrument(skip(state, session, auth, body))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(body): Json<AddBody>,
) -> Result<Json<CartView>> {
    if body.item.quantity == 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let mut cart = cart::load(&session).await;
    cart.add(body.item);
    persist(&state, &session, &auth, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Body of `POST /cart/update`.
#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub id: ProductId,
    pub quantity: u32,
}

/// Set a line's quantity (zero removes it).
#[instrument(skip(state, session, auth))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(body): Json<UpdateBody>,
) -> Result<Json<CartView>> {
    let mut cart = cart::load(&session).await;
    if !cart.update_quantity(&body.id, body.quantity) {
        return Err(AppError::NotFound(format!("cart line {}", body.id)));
    }
    persist(&state, &session, &auth, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Body of `POST /cart/remove`.
#[derive(Debug, Deserialize)]
pub struct RemoveBody {
    pub id: ProductId,
}

/// Remove a line.
#[instrument(skip(state, session, auth))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(body): Json<RemoveBody>,
) -> Result<Json<CartView>> {
    let mut cart = cart::load(&session).await;
    if !cart.remove(&body.id) {
        return Err(AppError::NotFound(format!("cart line {}", body.id)));
    }
    persist(&state, &session, &auth, &cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Unit count for the cart badge.
#[derive(Debug, Serialize)]
pub struct CountView {
    pub count: u32,
}

/// Cart badge count.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<Json<CountView>> {
    let cart = cart::load(&session).await;
    Ok(Json(CountView { count: cart.count() }))
}

/// Save to the session and, for logged-in buyers, mirror to the backend.
async fn persist(
    state: &AppState,
    session: &Session,
    auth: &OptionalAuth,
    cart: &Cart,
) -> Result<()> {
    cart::save(session, cart)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    if let OptionalAuth(Some(user)) = auth
        && let Err(e) = state.commerce().put_cart(user.id, cart.items()).await
    {
        tracing::warn!(user_id = %user.id, error = %e, "backend cart sync failed");
    }

    Ok(())
}
