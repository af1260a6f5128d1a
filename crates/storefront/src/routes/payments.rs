//! Payment handlers: order creation, capture, cancel, and the order-status
//! view.
//!
//! Ordering guarantees live here: creation resolves (or is reused from the
//! tracker) strictly before capture is possible; capture completes before
//! the cart is cleared; the cart is cleared before the tracker cookie, so
//! the resume breadcrumb never disappears ahead of a durably confirmed
//! success.

use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{OrderId, OrderStatus};

use crate::cart;
use crate::checkout::resume::{PendingStore, SharedPendingStore};
use crate::checkout::{PendingOrder, draft, reconcile};
use crate::error::{AppError, Result};
use crate::payments::{CancelRedirect, OrderRecord, PaymentError, PaymentGateway, PaymentsApi};
use crate::routes::checkout::{gate_from_headers, selected_provider, with_cookie_update};
use crate::state::AppState;

/// Response of `POST /checkout/order`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderView {
    pub order_id: OrderId,
    /// Whether an already-tracked order was reused.
    pub reused: bool,
}

/// Create the order for the current checkout, or reuse the tracked one.
#[instrument(skip(state, session, pending, headers))]
pub async fn create_order(
    State(state): State<AppState>,
    session: Session,
    PendingOrder(pending): PendingOrder,
    headers: axum::http::HeaderMap,
) -> Result<Response> {
    let provider = selected_provider(&session).await;

    // The gate covers the whole adapter: no consent, no provider calls.
    let gate = gate_from_headers(&headers);
    if let Err(category) = gate.require(provider.consent_category()) {
        return Err(AppError::ConsentRequired(category));
    }

    let current_draft = draft::load(&session).await;
    let current_cart = cart::load(&session).await;

    let measurements = current_draft.measurements().copied().unwrap_or_default();
    let delivery = current_draft.delivery().cloned().unwrap_or_default();

    let store = SharedPendingStore::seeded(pending);
    let gateway = PaymentGateway::new(state.backend(), provider);
    let outcome = gateway
        .create_order(&store, current_cart.items(), &measurements, &delivery)
        .await
        .map_err(map_payment_error)?;

    let view = CreateOrderView {
        order_id: outcome.order_id().clone(),
        reused: outcome.reused(),
    };
    Ok(with_cookie_update(&state, &store, Json(view)))
}

/// Body of `POST /checkout/order/capture`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    pub order_id: OrderId,
}

/// Response of `POST /checkout/order/capture`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureView {
    pub status: OrderStatus,
    pub completed: bool,
}

/// Capture after the provider's approval callback.
///
/// On terminal success: cart clear, then draft clear, then tracker clear -
/// strictly in that order. Any capture failure leaves all three intact for
/// later reconciliation.
#[instrument(skip(state, session, pending), fields(order_id = %body.order_id))]
pub async fn capture_order(
    State(state): State<AppState>,
    session: Session,
    PendingOrder(pending): PendingOrder,
    Json(body): Json<CaptureBody>,
) -> Result<Response> {
    let provider = selected_provider(&session).await;
    let store = SharedPendingStore::seeded(pending);
    let gateway = PaymentGateway::new(state.backend(), provider);

    let status = gateway
        .capture(&body.order_id)
        .await
        .map_err(map_payment_error)?;

    let completed = status.is_success();
    if completed {
        // Order confirmation is best-effort and must not fail the capture.
        send_confirmation(&state, &session, &body.order_id).await;

        cart::clear(&session)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        draft::clear(&session)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        store.clear();
    }

    let view = CaptureView { status, completed };
    Ok(with_cookie_update(&state, &store, Json(view)))
}

/// Body of `POST /checkout/order/cancel`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub order_id: OrderId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Response of `POST /checkout/order/cancel`.
#[derive(Debug, Serialize)]
pub struct CancelView {
    pub redirect: String,
}

/// Provider-side cancel callback (buyer closed the provider UI).
///
/// Deliberately leaves the tracker cookie alone: the same order id is
/// reused when the buyer retries, and only a fetched terminal status may
/// clear the pin.
#[instrument(skip(state, session), fields(order_id = %body.order_id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancelView>> {
    let provider = selected_provider(&session).await;
    let gateway = PaymentGateway::new(state.backend(), provider);

    let reason = body.reason.as_deref().unwrap_or("buyer canceled at provider");
    let CancelRedirect { location } = gateway.cancel(&body.order_id, reason).await;

    Ok(Json(CancelView { redirect: location }))
}

/// What the buyer can do next from the status view. Every terminal failure
/// keeps an actionable path.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    /// Resume or retry payment for this order.
    ResumePayment,
    /// Start over from the shop.
    StartNewOrder,
    /// Nothing pending; keep shopping.
    ContinueShopping,
    /// Something is in flight; check back.
    CheckBackLater,
}

/// Response of `GET /orders/{id}/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusView {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub next_action: NextAction,
}

/// Authoritative order status, re-fetched on every view.
#[instrument(skip(state))]
pub async fn order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusView>> {
    let order_id =
        OrderId::new(id).ok_or_else(|| AppError::BadRequest("empty order id".to_string()))?;

    let order = state.backend().get_order(&order_id).await?;

    let next_action = match reconcile::classify(order.id.clone(), order.status.clone()) {
        reconcile::Reconciliation::Completed { .. } => NextAction::ContinueShopping,
        reconcile::Reconciliation::Canceled { .. } => NextAction::StartNewOrder,
        reconcile::Reconciliation::Resume { .. } => NextAction::ResumePayment,
        _ => NextAction::CheckBackLater,
    };

    Ok(Json(OrderStatusView { order, next_action }))
}

// =============================================================================
// Helpers
// =============================================================================

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::Validation(v) => AppError::Validation(v),
        PaymentError::Backend(b) => AppError::Backend(b),
    }
}

/// Send the order confirmation mail when the draft still has the buyer's
/// address. Failures are logged only.
async fn send_confirmation(state: &AppState, session: &Session, order_id: &OrderId) {
    let current_draft = draft::load(session).await;
    let Some(delivery) = current_draft.delivery() else {
        return;
    };
    let Ok(email) = atelier_core::Email::parse(&delivery.email) else {
        return;
    };

    match state.backend().get_order(order_id).await {
        Ok(record) => {
            if let Err(e) = state
                .mailer()
                .send_order_confirmation(&email, order_id, &record.total_amount)
                .await
            {
                tracing::warn!(order_id = %order_id, error = %e, "order confirmation mail failed");
            }
        }
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "could not fetch order for confirmation mail");
        }
    }
}
