//! Checkout flow handlers.
//!
//! `show` reconciles the pending order against the backend *before* any
//! payment UI data is assembled, so a resumable order never flashes a fresh
//! "create order" button.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use atelier_core::{ConsentCategory, DeliveryDetails, Measurements};

use crate::cart;
use crate::checkout::resume::{PendingStore, SharedPendingStore, clear_cookie};
use crate::checkout::{CheckoutStep, DraftError, OrderDraft, PendingOrder, Reconciliation, draft, reconcile};
use crate::consent::{ConsentGate, ConsentPreferences, GateState};
use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::payments::ProviderKind;
use crate::state::AppState;

/// What the payment step renders: the real SDK control or a
/// consent-request affordance.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentSurface {
    /// Consent granted and the provider is configured.
    Sdk {
        provider: ProviderKind,
        script_url: String,
    },
    /// The provider's consent category is blocked; no script URL leaves the
    /// server.
    ConsentRequired {
        provider: ProviderKind,
        category: ConsentCategory,
        grant_path: &'static str,
    },
    /// The provider has no credentials configured.
    Unavailable { provider: ProviderKind },
}

/// Full checkout state for the front end.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub step: u8,
    pub draft: OrderDraft,
    pub cart_count: u32,
    pub cart_subtotal: String,
    pub reconciliation: Reconciliation,
    pub payment: PaymentSurface,
}

/// Current checkout state.
///
/// Reconciliation runs first; a fetched terminal status performs its
/// side effects here (cart before tracker, per the ordering guarantee).
#[instrument(skip(state, session, pending, headers))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    PendingOrder(pending): PendingOrder,
    headers: HeaderMap,
) -> Result<Response> {
    let store = SharedPendingStore::seeded(pending);
    let outcome = reconcile::reconcile(state.backend(), store.get().as_ref()).await?;

    let mut current_draft = draft::load(&session).await;

    if outcome.clears_cart() {
        // Success confirmed by fetched status: cart first, then tracker.
        cart::clear(&session)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        draft::clear(&session)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        current_draft = OrderDraft::default();
    }
    if outcome.clears_tracker() {
        store.clear();
    }

    let provider = selected_provider(&session).await;
    let gate = gate_from_headers(&headers);
    let payment = payment_surface(&state, provider, &gate);

    let cart = cart::load(&session).await;
    let view = CheckoutView {
        step: current_draft.step().number(),
        draft: current_draft,
        cart_count: cart.count(),
        cart_subtotal: cart.subtotal().display(),
        reconciliation: outcome,
        payment,
    };

    Ok(with_cookie_update(&state, &store, Json(view)))
}

/// Step 1: submit measurements.
#[instrument(skip(session))]
pub async fn submit_measurements(
    session: Session,
    Json(measurements): Json<Measurements>,
) -> Result<Json<StepResponse>> {
    let mut current = draft::load(&session).await;
    current.submit_measurements(measurements).map_err(map_draft_error)?;
    draft::save(&session, &current)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(StepResponse {
        step: current.step().number(),
    }))
}

/// Step 2: submit delivery details.
#[instrument(skip(session))]
pub async fn submit_delivery(
    session: Session,
    Json(delivery): Json<DeliveryDetails>,
) -> Result<Json<StepResponse>> {
    let mut current = draft::load(&session).await;
    current.submit_delivery(delivery).map_err(map_draft_error)?;
    draft::save(&session, &current)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(StepResponse {
        step: current.step().number(),
    }))
}

/// Select the payment provider for this checkout.
#[instrument(skip(session))]
pub async fn select_provider(
    session: Session,
    Json(body): Json<SelectProviderBody>,
) -> Result<Json<StepResponse>> {
    session
        .insert(session_keys::PAYMENT_PROVIDER, body.provider)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let current = draft::load(&session).await;
    Ok(Json(StepResponse {
        step: current.step().number(),
    }))
}

/// Explicit user reset: clear the draft and stop tracking the pending
/// order. This is one of the two legitimate tracker-clear sites.
#[instrument(skip(state, session, pending))]
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    PendingOrder(pending): PendingOrder,
) -> Result<Response> {
    draft::clear(&session)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    if pending.is_some() {
        append_cookie(&mut headers, &clear_cookie(state.secure_cookies()));
    }

    Ok((headers, Json(StepResponse { step: CheckoutStep::Measurements.number() })).into_response())
}

/// Response body for step mutations.
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub step: u8,
}

/// Body of `POST /checkout/provider`.
#[derive(Debug, Deserialize)]
pub struct SelectProviderBody {
    pub provider: ProviderKind,
}

// =============================================================================
// Helpers shared with the payments handlers
// =============================================================================

/// The provider chosen for this checkout (PayPal when none was picked).
pub async fn selected_provider(session: &Session) -> ProviderKind {
    session
        .get::<ProviderKind>(session_keys::PAYMENT_PROVIDER)
        .await
        .ok()
        .flatten()
        .unwrap_or(ProviderKind::PayPal)
}

/// Build the consent gate from the request's cookies.
pub fn gate_from_headers(headers: &HeaderMap) -> ConsentGate {
    let prefs = headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map_or_else(ConsentPreferences::necessary_only, ConsentPreferences::from_cookie_header);
    ConsentGate::new(prefs)
}

fn payment_surface(state: &AppState, provider: ProviderKind, gate: &ConsentGate) -> PaymentSurface {
    match gate.decide(provider.consent_category()) {
        GateState::Blocked => PaymentSurface::ConsentRequired {
            provider,
            category: provider.consent_category(),
            grant_path: "/consent/preferences",
        },
        GateState::Allowed => match provider.sdk_script_url(&state.config().providers) {
            Some(script_url) => PaymentSurface::Sdk {
                provider,
                script_url,
            },
            None => PaymentSurface::Unavailable { provider },
        },
    }
}

fn map_draft_error(err: DraftError) -> AppError {
    match err {
        DraftError::Invalid(v) => AppError::Validation(v),
        DraftError::MeasurementsFirst => {
            AppError::BadRequest("measurements must be submitted first".to_string())
        }
    }
}

/// Attach a pending-order cookie update to a response, when one happened.
pub fn with_cookie_update<R: IntoResponse>(
    state: &AppState,
    store: &SharedPendingStore,
    response: R,
) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = store.take_cookie_update(state.secure_cookies())
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

fn append_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(SET_COOKIE, value);
    }
}
